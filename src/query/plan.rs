//! Immutable execution plan produced by the optimizer.
//!
//! The plan records the chosen index strategy, the residual filters,
//! the fields worth deserializing, and the ordering/grouping/paging
//! work left for the executor. `explain()` renders the plan as a
//! document and `plan_hash()` gives a deterministic fingerprint for
//! caching and diagnostics.

use std::fmt;
use std::ops::Bound;

use xxhash_rust::xxh64::Xxh64;

use crate::document::{Document, Value};
use crate::expression::Expression;
use crate::query::Order;

/// Access strategy the executor drives against the index layer.
#[derive(Clone, Debug)]
pub enum IndexStrategy {
    /// Full traversal of one index in the given order.
    All {
        /// Index name.
        name: String,
        /// Iteration direction.
        order: Order,
    },
    /// Probe one or more keys by equality; `IN` lists carry several.
    Equals {
        /// Index name.
        name: String,
        /// Keys probed, in planning order, deduplicated.
        values: Vec<Value>,
    },
    /// Contiguous key range.
    Range {
        /// Index name.
        name: String,
        /// Lower bound.
        start: Bound<Value>,
        /// Upper bound.
        end: Bound<Value>,
        /// Iteration direction.
        order: Order,
    },
    /// Full traversal evaluating a predicate against each key, with
    /// `@` bound to the key.
    Scan {
        /// Index name.
        name: String,
        /// Key predicate.
        predicate: Expression,
        /// Iteration direction.
        order: Order,
    },
    /// Externally supplied document sequence (system collections).
    Virtual,
}

impl IndexStrategy {
    /// Name of the probed index; virtual sources have none.
    pub fn name(&self) -> Option<&str> {
        match self {
            IndexStrategy::All { name, .. }
            | IndexStrategy::Equals { name, .. }
            | IndexStrategy::Range { name, .. }
            | IndexStrategy::Scan { name, .. } => Some(name),
            IndexStrategy::Virtual => None,
        }
    }

    /// Iteration order, where the strategy defines one.
    pub fn order(&self) -> Option<Order> {
        match self {
            IndexStrategy::All { order, .. }
            | IndexStrategy::Range { order, .. }
            | IndexStrategy::Scan { order, .. } => Some(*order),
            IndexStrategy::Equals { .. } | IndexStrategy::Virtual => None,
        }
    }

    /// Adopts the user's requested order for strategies that iterate.
    pub(crate) fn set_order(&mut self, requested: Order) {
        match self {
            IndexStrategy::All { order, .. }
            | IndexStrategy::Range { order, .. }
            | IndexStrategy::Scan { order, .. } => *order = requested,
            IndexStrategy::Equals { .. } | IndexStrategy::Virtual => {}
        }
    }
}

impl fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStrategy::All { name, order } => {
                write!(f, "INDEX ALL({name}) {}", order.value())
            }
            IndexStrategy::Equals { name, values } if values.len() == 1 => {
                write!(f, "INDEX SEEK({name} = {})", values[0])
            }
            IndexStrategy::Equals { name, values } => {
                write!(f, "INDEX SEEK({name} IN {} keys)", values.len())
            }
            IndexStrategy::Range { name, start, end, order } => {
                write!(f, "INDEX RANGE({name} ")?;
                match start {
                    Bound::Included(v) => write!(f, "[{v}")?,
                    Bound::Excluded(v) => write!(f, "({v}")?,
                    Bound::Unbounded => write!(f, "(..")?,
                }
                write!(f, " .. ")?;
                match end {
                    Bound::Included(v) => write!(f, "{v}]")?,
                    Bound::Excluded(v) => write!(f, "{v})")?,
                    Bound::Unbounded => write!(f, "..)")?,
                }
                write!(f, ") {}", order.value())
            }
            IndexStrategy::Scan { name, predicate, order } => {
                write!(f, "INDEX SCAN({name} WHERE {predicate}) {}", order.value())
            }
            IndexStrategy::Virtual => write!(f, "VIRTUAL"),
        }
    }
}

/// Sort step the executor runs when the index order is not enough.
#[derive(Clone, Debug)]
pub struct OrderBy {
    /// Sort key expression.
    pub expression: Expression,
    /// Sort direction.
    pub order: Order,
}

/// Grouping step, with its optional group filter.
#[derive(Clone, Debug)]
pub struct GroupBy {
    /// Grouping key expression.
    pub expression: Expression,
    /// Predicate applied to each finished group.
    pub having: Option<Expression>,
}

/// Immutable record of the chosen execution strategy.
#[derive(Clone, Debug)]
pub struct QueryPlan {
    /// Collection the plan runs against.
    pub collection: String,
    /// Chosen access strategy.
    pub index: IndexStrategy,
    /// Estimated entries touched by the strategy.
    pub index_cost: u64,
    /// Normalized source of the indexed expression, for later
    /// comparisons (order adoption, key-only detection).
    pub index_expression: String,
    /// True when the query can be served from index keys without
    /// loading documents.
    pub is_index_key_only: bool,
    /// Predicates left to evaluate per document.
    pub filters: Vec<Expression>,
    /// Root fields worth deserializing; empty means all.
    pub fields: Vec<String>,
    /// Includes hydrated before filtering.
    pub include_before: Vec<Expression>,
    /// Includes hydrated for the projection.
    pub include_after: Vec<Expression>,
    /// Residual sort step, when the index order is not enough.
    pub order_by: Option<OrderBy>,
    /// Grouping step.
    pub group_by: Option<GroupBy>,
    /// Projection expression.
    pub select: Expression,
    /// Maximum number of results.
    pub limit: usize,
    /// Results skipped before emitting.
    pub offset: usize,
    /// Whether the executor takes write locks.
    pub for_update: bool,
}

impl QueryPlan {
    /// Renders the plan as a document, the shape surfaced by the
    /// `EXPLAIN` shell command.
    pub fn explain(&self) -> Document {
        let mut doc = Document::new();
        let set = |doc: &mut Document, key: &str, value: Value| {
            doc.insert(key, value).expect("static explain key");
        };
        set(&mut doc, "collection", Value::String(self.collection.clone()));
        set(
            &mut doc,
            "snapshot",
            Value::String(if self.for_update { "write" } else { "read" }.into()),
        );

        let mut index = Document::new();
        if let Some(name) = self.index.name() {
            set(&mut index, "name", Value::String(name.to_owned()));
        }
        set(&mut index, "mode", Value::String(self.index.to_string()));
        set(
            &mut index,
            "expr",
            Value::String(self.index_expression.clone()),
        );
        set(&mut index, "cost", Value::Int64(self.index_cost as i64));
        set(&mut doc, "index", Value::Document(index));

        let mut lookup = Document::new();
        set(&mut lookup, "keyOnly", Value::Boolean(self.is_index_key_only));
        set(
            &mut lookup,
            "fields",
            Value::Array(
                self.fields
                    .iter()
                    .map(|f| Value::String(f.clone()))
                    .collect(),
            ),
        );
        set(&mut doc, "lookup", Value::Document(lookup));

        if !self.filters.is_empty() {
            set(
                &mut doc,
                "filters",
                Value::Array(
                    self.filters
                        .iter()
                        .map(|f| Value::String(f.source().to_owned()))
                        .collect(),
                ),
            );
        }
        if !self.include_before.is_empty() {
            set(
                &mut doc,
                "includeBefore",
                Value::Array(
                    self.include_before
                        .iter()
                        .map(|i| Value::String(i.source().to_owned()))
                        .collect(),
                ),
            );
        }
        if !self.include_after.is_empty() {
            set(
                &mut doc,
                "includeAfter",
                Value::Array(
                    self.include_after
                        .iter()
                        .map(|i| Value::String(i.source().to_owned()))
                        .collect(),
                ),
            );
        }
        if let Some(order_by) = &self.order_by {
            let mut ob = Document::new();
            set(&mut ob, "expr", Value::String(order_by.expression.source().to_owned()));
            set(&mut ob, "order", Value::Int32(order_by.order.value()));
            set(&mut doc, "orderBy", Value::Document(ob));
        }
        if let Some(group_by) = &self.group_by {
            let mut gb = Document::new();
            set(&mut gb, "expr", Value::String(group_by.expression.source().to_owned()));
            if let Some(having) = &group_by.having {
                set(&mut gb, "having", Value::String(having.source().to_owned()));
            }
            set(&mut doc, "groupBy", Value::Document(gb));
        }
        set(&mut doc, "select", Value::String(self.select.source().to_owned()));
        if self.limit != usize::MAX {
            set(&mut doc, "limit", Value::Int64(self.limit as i64));
        }
        if self.offset != 0 {
            set(&mut doc, "offset", Value::Int64(self.offset as i64));
        }
        set(&mut doc, "planHash", Value::Int64(self.plan_hash() as i64));
        doc
    }

    /// Deterministic fingerprint over the plan's decisions, stable
    /// across processes.
    pub fn plan_hash(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        let mut write = |text: &str| {
            hasher.update(text.as_bytes());
            hasher.update(&[0]);
        };
        write(&self.collection);
        write(&self.index.to_string());
        write(&self.index_expression);
        for filter in &self.filters {
            write(filter.source());
        }
        for include in self.include_before.iter().chain(&self.include_after) {
            write(include.source());
        }
        if let Some(order_by) = &self.order_by {
            write(order_by.expression.source());
            write(if order_by.order == Order::Ascending { "+1" } else { "-1" });
        }
        if let Some(group_by) = &self.group_by {
            write(group_by.expression.source());
            if let Some(having) = &group_by.having {
                write(having.source());
            }
        }
        write(self.select.source());
        write(&self.limit.to_string());
        write(&self.offset.to_string());
        hasher.digest()
    }
}
