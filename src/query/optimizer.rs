//! Rule pipeline turning a [`Query`] into a [`QueryPlan`].
//!
//! The pipeline is fixed: split the where clause into conjunctive
//! terms, rewrite indexable shapes, collect the fields worth
//! deserializing, pick the cheapest index candidate (or a traversal
//! fallback), drop the consumed term from the filters, collapse
//! order-by/group-by into the index order where possible, and split
//! includes into before/after phases.

use std::ops::Bound;
use std::sync::Arc;

use tracing::debug;

use crate::document::{Collation, Value};
use crate::error::{Error, Result};
use crate::expression::node::{self, BinaryOp, Node, Quantifier, Shape};
use crate::expression::{functions, ExprKind, Expression};
use crate::query::cost::IndexPredicate;
use crate::query::plan::{GroupBy, IndexStrategy, OrderBy, QueryPlan};
use crate::query::snapshot::{IndexDescriptor, QuerySnapshot};
use crate::query::{Order, Query};

/// Single-use planner over one query and one snapshot.
pub struct QueryOptimizer<'a> {
    snapshot: &'a dyn QuerySnapshot,
    query: &'a Query,
    collation: &'a Collation,
}

struct ChosenIndex {
    strategy: IndexStrategy,
    cost: u64,
    expression: String,
    consumed: Option<Expression>,
}

impl<'a> QueryOptimizer<'a> {
    /// Creates the planner; `process` does the work.
    pub fn new(
        snapshot: &'a dyn QuerySnapshot,
        query: &'a Query,
        collation: &'a Collation,
    ) -> Self {
        QueryOptimizer {
            snapshot,
            query,
            collation,
        }
    }

    /// Runs the full planning pipeline.
    pub fn process(&self) -> Result<QueryPlan> {
        let mut terms = self.split_where_terms()?;
        self.rewrite_terms(&mut terms);
        let fields = self.collect_fields(&terms);

        let mut chosen = self.choose_index(&terms, &fields)?;
        let is_index_key_only = fields.len() == 1
            && chosen
                .expression
                .eq_ignore_ascii_case(&format!("$.{}", fields[0]));

        let filters: Vec<Expression> = terms
            .iter()
            .filter(|term| {
                chosen
                    .consumed
                    .as_ref()
                    .map_or(true, |consumed| !consumed.same_node(term))
            })
            .cloned()
            .collect();

        let order_by = self.define_order_by(&mut chosen);
        let (order_by, group_by) = self.define_group_by(order_by, &chosen)?;
        let (include_before, include_after) = self.partition_includes(&filters, &order_by)?;

        debug!(
            collection = self.snapshot.collection_name(),
            index = %chosen.strategy,
            cost = chosen.cost,
            filters = filters.len(),
            "query plan selected"
        );

        Ok(QueryPlan {
            collection: self.snapshot.collection_name().to_owned(),
            index: chosen.strategy,
            index_cost: chosen.cost,
            index_expression: chosen.expression,
            is_index_key_only,
            filters,
            fields,
            include_before,
            include_after,
            order_by,
            group_by,
            select: self.query.select.clone(),
            limit: self.query.limit,
            offset: self.query.offset,
            for_update: self.query.for_update,
        })
    }

    /// Flattens the where clause over `AND`, validating each leaf.
    fn split_where_terms(&self) -> Result<Vec<Expression>> {
        let mut terms = Vec::new();
        for expr in &self.query.where_exprs {
            split_term(expr, &mut terms)?;
        }
        Ok(terms)
    }

    /// Rewrites `seq ANY = scalar_path` into `scalar_path IN
    /// ARRAY(seq)`, the indexable form of the contains pattern.
    fn rewrite_terms(&self, terms: &mut [Expression]) {
        for term in terms.iter_mut() {
            if term.kind() != ExprKind::Equal || !term.is_any() {
                continue;
            }
            let (Some(left), Some(right)) = (term.left(), term.right()) else {
                continue;
            };
            if left.is_scalar() || right.kind() != ExprKind::Path || !right.is_scalar() {
                continue;
            }
            let array = functions::lookup("ARRAY").expect("ARRAY is registered");
            let wrapped = Node::build(Shape::Call {
                func: array,
                args: vec![Arc::clone(left.node())],
            });
            let rewritten = Node::build(Shape::Binary {
                op: BinaryOp::In,
                quantifier: Quantifier::Implicit,
                left: Arc::clone(right.node()),
                right: wrapped,
            });
            debug!(from = term.source(), to = %rewritten.source, "rewrote ANY-equality into IN");
            *term = Expression::from_node(rewritten, term.share_parameters());
        }
    }

    /// Union of the fields every pipeline stage reads; `"$"` anywhere
    /// clears the set, meaning whole documents are loaded.
    fn collect_fields(&self, terms: &[Expression]) -> Vec<String> {
        let mut fields = Vec::new();
        let mut merge = |expr: &Expression| {
            for field in expr.fields() {
                node::add_field(&mut fields, field);
            }
        };
        merge(&self.query.select);
        for term in terms {
            merge(term);
        }
        for include in &self.query.includes {
            merge(include);
        }
        if let Some(group_by) = &self.query.group_by {
            merge(group_by);
        }
        if let Some(having) = &self.query.having {
            merge(having);
        }
        if let Some(order_by) = &self.query.order_by {
            merge(order_by);
        }
        if fields.iter().any(|f| f == "$") {
            fields.clear();
        }
        fields
    }

    /// Picks the cheapest candidate, or a traversal fallback reusing
    /// group-by/order-by/preferred-field indexes, or the `_id` scan.
    fn choose_index(&self, terms: &[Expression], fields: &[String]) -> Result<ChosenIndex> {
        if self.query.virtual_source {
            return Ok(ChosenIndex {
                strategy: IndexStrategy::Virtual,
                cost: 0,
                expression: String::new(),
                consumed: None,
            });
        }
        let indexes = self.snapshot.indexes();

        let mut best: Option<ChosenIndex> = None;
        for term in terms {
            let Some(candidate) = self.candidate_for(term, &indexes)? else {
                continue;
            };
            if best.as_ref().map_or(true, |b| candidate.cost < b.cost) {
                best = Some(candidate);
            }
        }
        if let Some(best) = best {
            return Ok(best);
        }

        if let Some(group_by) = &self.query.group_by {
            if let Some(index) = indexes.iter().find(|i| i.expression == group_by.source()) {
                return Ok(self.full_traversal(index, Order::Ascending));
            }
        }
        if let Some(order_by) = &self.query.order_by {
            if let Some(index) = indexes.iter().find(|i| i.expression == order_by.source()) {
                return Ok(self.full_traversal(index, self.query.order));
            }
        }
        if let [only_field] = fields {
            let preferred = format!("$.{only_field}");
            if let Some(index) = indexes.iter().find(|i| i.expression == preferred) {
                return Ok(self.full_traversal(index, Order::Ascending));
            }
        }

        let primary = indexes
            .iter()
            .find(|i| i.name == "_id")
            .cloned()
            .unwrap_or_else(|| IndexDescriptor::primary(0));
        Ok(self.full_traversal(&primary, Order::Ascending))
    }

    fn full_traversal(&self, index: &IndexDescriptor, order: Order) -> ChosenIndex {
        ChosenIndex {
            strategy: IndexStrategy::All {
                name: index.name.clone(),
                order,
            },
            cost: self.snapshot.cost(index, &IndexPredicate::FullScan),
            expression: index.expression.clone(),
            consumed: None,
        }
    }

    /// Builds the index candidate for one term, if the term has an
    /// indexable shape against an existing index.
    fn candidate_for(
        &self,
        term: &Expression,
        indexes: &[IndexDescriptor],
    ) -> Result<Option<ChosenIndex>> {
        if term.is_all() {
            // ALL-quantified comparisons are never indexable.
            return Ok(None);
        }
        let kind = term.kind();
        let (Some(left), Some(right)) = (term.left(), term.right()) else {
            return Ok(None);
        };

        // Orient the term as (indexed path, plan-time value).
        let (path, value_expr, op) = if term.is_any() {
            // The sequence must be on the left, the value on the right,
            // and the index keyed by the sequence's expression.
            if !is_plan_time_value(&right) || left.is_scalar() {
                return Ok(None);
            }
            (left, right, kind)
        } else if is_plan_time_value(&right) && !is_plan_time_value(&left) {
            (left, right, kind)
        } else if is_plan_time_value(&left) && !is_plan_time_value(&right) {
            let Some(mirrored) = mirror(kind) else {
                return Ok(None);
            };
            (right, left, mirrored)
        } else {
            return Ok(None);
        };

        let Some(index) = indexes.iter().find(|i| i.expression == path.source()) else {
            return Ok(None);
        };
        let value = value_expr.execute_scalar(None, Some(self.collation))?;

        let built = match op {
            ExprKind::Equal => Some((
                IndexStrategy::Equals {
                    name: index.name.clone(),
                    values: vec![value.clone()],
                },
                IndexPredicate::Equals(vec![value]),
                Some(term.clone()),
            )),
            ExprKind::GreaterThan | ExprKind::GreaterThanOrEqual => {
                let inclusive = op == ExprKind::GreaterThanOrEqual;
                Some((
                    IndexStrategy::Range {
                        name: index.name.clone(),
                        start: if inclusive {
                            Bound::Included(value.clone())
                        } else {
                            Bound::Excluded(value.clone())
                        },
                        end: Bound::Unbounded,
                        order: Order::Ascending,
                    },
                    IndexPredicate::Greater(value),
                    Some(term.clone()),
                ))
            }
            ExprKind::LessThan | ExprKind::LessThanOrEqual => {
                let inclusive = op == ExprKind::LessThanOrEqual;
                Some((
                    IndexStrategy::Range {
                        name: index.name.clone(),
                        start: Bound::Unbounded,
                        end: if inclusive {
                            Bound::Included(value.clone())
                        } else {
                            Bound::Excluded(value.clone())
                        },
                        order: Order::Ascending,
                    },
                    IndexPredicate::Less(value),
                    Some(term.clone()),
                ))
            }
            ExprKind::Between => match value.as_array() {
                Some([low, high]) => Some((
                    IndexStrategy::Range {
                        name: index.name.clone(),
                        start: Bound::Included(low.clone()),
                        end: Bound::Included(high.clone()),
                        order: Order::Ascending,
                    },
                    IndexPredicate::Between(low.clone(), high.clone()),
                    Some(term.clone()),
                )),
                _ => None,
            },
            ExprKind::In => {
                let values = match value {
                    Value::Array(items) => {
                        let mut distinct: Vec<Value> = Vec::with_capacity(items.len());
                        for item in items {
                            if !distinct.contains(&item) {
                                distinct.push(item);
                            }
                        }
                        distinct
                    }
                    other => vec![other],
                };
                if values.is_empty() {
                    None
                } else {
                    Some((
                        IndexStrategy::Equals {
                            name: index.name.clone(),
                            values: values.clone(),
                        },
                        IndexPredicate::Equals(values),
                        Some(term.clone()),
                    ))
                }
            }
            ExprKind::Like => self.like_candidate(term, index, &value),
            _ => None,
        };

        Ok(built.map(|(strategy, predicate, consumed)| ChosenIndex {
            cost: self.snapshot.cost(index, &predicate),
            expression: index.expression.clone(),
            strategy,
            consumed,
        }))
    }

    /// `LIKE 'prefix%'` becomes a prefix range; a pattern with further
    /// wildcards keeps the term as a filter over the range; a pattern
    /// with no literal prefix degrades to a key scan.
    fn like_candidate(
        &self,
        term: &Expression,
        index: &IndexDescriptor,
        value: &Value,
    ) -> Option<(IndexStrategy, IndexPredicate, Option<Expression>)> {
        let pattern = value.as_str()?;
        let prefix: String = pattern
            .chars()
            .take_while(|&c| c != '%' && c != '_')
            .collect();
        if prefix.is_empty() {
            let key_predicate = Node::build(Shape::Binary {
                op: BinaryOp::Like,
                quantifier: Quantifier::Implicit,
                left: Node::build(Shape::Current),
                right: Node::build(Shape::Literal(Value::String(pattern.to_owned()))),
            });
            return Some((
                IndexStrategy::Scan {
                    name: index.name.clone(),
                    predicate: Expression::from_node(key_predicate, term.share_parameters()),
                    order: Order::Ascending,
                },
                IndexPredicate::FullScan,
                Some(term.clone()),
            ));
        }
        let exact = pattern
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest == "%");
        let mut upper = prefix.clone();
        upper.push(char::MAX);
        Some((
            IndexStrategy::Range {
                name: index.name.clone(),
                start: Bound::Included(Value::String(prefix.clone())),
                end: Bound::Excluded(Value::String(upper)),
                order: Order::Ascending,
            },
            IndexPredicate::LikePrefix(prefix),
            exact.then(|| term.clone()),
        ))
    }

    /// Drops the sort when the index already iterates in the requested
    /// expression's order.
    fn define_order_by(&self, chosen: &mut ChosenIndex) -> Option<OrderBy> {
        let order_by = self.query.order_by.as_ref()?;
        if order_by.source() == chosen.expression {
            chosen.strategy.set_order(self.query.order);
            return None;
        }
        Some(OrderBy {
            expression: order_by.clone(),
            order: self.query.order,
        })
    }

    /// Grouping excludes user ordering and includes; a pre-sort on the
    /// group key is injected unless the index already provides it.
    fn define_group_by(
        &self,
        order_by: Option<OrderBy>,
        chosen: &ChosenIndex,
    ) -> Result<(Option<OrderBy>, Option<GroupBy>)> {
        let Some(group_expr) = &self.query.group_by else {
            if self.query.having.is_some() {
                return Err(Error::InvalidQuery("having requires group by"));
            }
            return Ok((order_by, None));
        };
        if self.query.order_by.is_some() {
            return Err(Error::InvalidQuery("group by cannot be combined with order by"));
        }
        if !self.query.includes.is_empty() {
            return Err(Error::InvalidQuery("group by cannot be combined with includes"));
        }
        let pre_sort = if group_expr.source() == chosen.expression {
            None
        } else {
            Some(OrderBy {
                expression: group_expr.clone(),
                order: Order::Ascending,
            })
        };
        Ok((
            pre_sort,
            Some(GroupBy {
                expression: group_expr.clone(),
                having: self.query.having.clone(),
            }),
        ))
    }

    /// An include is hydrated before filtering when a remaining filter
    /// or the sort reads its field; it is hydrated again for the
    /// projection unless the pre-filter document survives unsorted.
    fn partition_includes(
        &self,
        filters: &[Expression],
        order_by: &Option<OrderBy>,
    ) -> Result<(Vec<Expression>, Vec<Expression>)> {
        let mut before = Vec::new();
        let mut after = Vec::new();
        for include in &self.query.includes {
            let field = match include.fields() {
                [field] if include.kind() == ExprKind::Path && field != "$" => field,
                _ => {
                    return Err(Error::InvalidExpressionType {
                        expression: include.source().to_owned(),
                        reason: "include requires a single-field path expression",
                    })
                }
            };
            let reads_field = |expr: &Expression| {
                expr.fields().iter().any(|f| f.eq_ignore_ascii_case(field))
            };
            let needed_before = filters.iter().any(|f| reads_field(f))
                || order_by
                    .as_ref()
                    .is_some_and(|ob| reads_field(&ob.expression));
            let needed_after = !needed_before || order_by.is_some();
            if needed_before {
                before.push(include.clone());
            }
            if needed_after {
                after.push(include.clone());
            }
        }
        Ok((before, after))
    }
}

fn split_term(expr: &Expression, terms: &mut Vec<Expression>) -> Result<()> {
    if expr.kind() == ExprKind::And {
        let left = expr.left().expect("AND nodes have two children");
        let right = expr.right().expect("AND nodes have two children");
        split_term(&left, terms)?;
        split_term(&right, terms)?;
        return Ok(());
    }
    if expr.uses_source() {
        return Err(Error::InvalidExpressionType {
            expression: expr.source().to_owned(),
            reason: "`*` is not allowed in where clauses",
        });
    }
    if !expr.is_predicate() {
        return Err(Error::InvalidExpressionType {
            expression: expr.source().to_owned(),
            reason: "where clauses require predicate expressions",
        });
    }
    terms.push(expr.clone());
    Ok(())
}

/// A side usable as an index probe value: it reads nothing from the
/// candidate document, so it can be evaluated once at plan time
/// against the parameters document.
fn is_plan_time_value(expr: &Expression) -> bool {
    expr.fields().is_empty() && !expr.uses_source()
}

fn mirror(kind: ExprKind) -> Option<ExprKind> {
    match kind {
        ExprKind::Equal => Some(ExprKind::Equal),
        ExprKind::GreaterThan => Some(ExprKind::LessThan),
        ExprKind::GreaterThanOrEqual => Some(ExprKind::LessThanOrEqual),
        ExprKind::LessThan => Some(ExprKind::GreaterThan),
        ExprKind::LessThanOrEqual => Some(ExprKind::GreaterThanOrEqual),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::snapshot::InMemorySnapshot;

    fn collation() -> Collation {
        Collation::binary()
    }

    fn users_snapshot() -> InMemorySnapshot {
        InMemorySnapshot::new("users", 1_000).with_index(
            IndexDescriptor::new("name_idx", "$.name", false)
                .unwrap()
                .with_key_count(1_000),
        )
    }

    fn where_query(source: &str) -> Query {
        let mut query = Query::new();
        query.where_exprs.push(Expression::parse(source).unwrap());
        query
    }

    #[test]
    fn no_predicates_fall_back_to_primary_scan() {
        let snapshot = InMemorySnapshot::new("users", 1_000);
        let plan = Query::new().optimize(&snapshot, &collation()).unwrap();
        match &plan.index {
            IndexStrategy::All { name, order } => {
                assert_eq!(name, "_id");
                assert_eq!(*order, Order::Ascending);
            }
            other => panic!("expected full scan, got {other:?}"),
        }
        assert_eq!(plan.index_expression, "$._id");
        assert!(plan.fields.is_empty());
        assert!(plan.filters.is_empty());
    }

    #[test]
    fn equality_on_indexed_field_consumes_the_term() {
        let snapshot = users_snapshot();
        let query = where_query("name = 'ada' AND age > 20");
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        match &plan.index {
            IndexStrategy::Equals { name, values } => {
                assert_eq!(name, "name_idx");
                assert_eq!(values, &vec![Value::String("ada".into())]);
            }
            other => panic!("expected equality probe, got {other:?}"),
        }
        assert_eq!(plan.index_expression, "$.name");
        let filter_sources: Vec<&str> = plan.filters.iter().map(|f| f.source()).collect();
        assert_eq!(filter_sources, vec!["$.age>20"]);
    }

    #[test]
    fn mirrored_comparison_indexes_the_path_side() {
        let snapshot = users_snapshot();
        let plan = where_query("'ada' = name")
            .optimize(&snapshot, &collation())
            .unwrap();
        assert!(matches!(plan.index, IndexStrategy::Equals { .. }));
        let plan = where_query("30 > name")
            .optimize(&snapshot, &collation())
            .unwrap();
        match &plan.index {
            IndexStrategy::Range { start, end, .. } => {
                assert_eq!(*start, Bound::Unbounded);
                assert_eq!(*end, Bound::Excluded(Value::Int32(30)));
            }
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn cheapest_candidate_wins() {
        let snapshot = InMemorySnapshot::new("users", 10_000)
            .with_index(
                IndexDescriptor::new("email_idx", "$.email", true)
                    .unwrap()
                    .with_key_count(10_000),
            )
            .with_index(
                IndexDescriptor::new("city_idx", "$.city", false)
                    .unwrap()
                    .with_key_count(10_000),
            );
        let plan = where_query("city = 'rome' AND email = 'a@b.c'")
            .optimize(&snapshot, &collation())
            .unwrap();
        match &plan.index {
            IndexStrategy::Equals { name, .. } => assert_eq!(name, "email_idx"),
            other => panic!("expected unique probe, got {other:?}"),
        }
        assert_eq!(plan.index_cost, 1);
        assert_eq!(plan.filters.len(), 1);
        assert_eq!(plan.filters[0].source(), "$.city=\"rome\"");
    }

    #[test]
    fn between_becomes_closed_range() {
        let snapshot = InMemorySnapshot::new("users", 1_000).with_index(
            IndexDescriptor::new("age_idx", "$.age", false)
                .unwrap()
                .with_key_count(1_000),
        );
        let plan = where_query("age BETWEEN 20 AND 30")
            .optimize(&snapshot, &collation())
            .unwrap();
        match &plan.index {
            IndexStrategy::Range { start, end, .. } => {
                assert_eq!(*start, Bound::Included(Value::Int32(20)));
                assert_eq!(*end, Bound::Included(Value::Int32(30)));
            }
            other => panic!("expected range, got {other:?}"),
        }
        assert!(plan.filters.is_empty());
    }

    #[test]
    fn in_list_probes_each_distinct_key() {
        let snapshot = users_snapshot();
        let plan = where_query("name IN ['a', 'b', 'a']")
            .optimize(&snapshot, &collation())
            .unwrap();
        match &plan.index {
            IndexStrategy::Equals { values, .. } => {
                assert_eq!(
                    values,
                    &vec![Value::String("a".into()), Value::String("b".into())]
                );
            }
            other => panic!("expected multi-key probe, got {other:?}"),
        }
        assert!(plan.filters.is_empty());
    }

    #[test]
    fn like_prefix_becomes_range_and_is_consumed() {
        let snapshot = users_snapshot();
        let plan = where_query("name LIKE 'ad%'")
            .optimize(&snapshot, &collation())
            .unwrap();
        match &plan.index {
            IndexStrategy::Range { start, .. } => {
                assert_eq!(*start, Bound::Included(Value::String("ad".into())));
            }
            other => panic!("expected prefix range, got {other:?}"),
        }
        assert!(plan.filters.is_empty());
    }

    #[test]
    fn like_with_inner_wildcards_keeps_the_filter() {
        let snapshot = users_snapshot();
        let plan = where_query("name LIKE 'ad%z'")
            .optimize(&snapshot, &collation())
            .unwrap();
        assert!(matches!(plan.index, IndexStrategy::Range { .. }));
        assert_eq!(plan.filters.len(), 1);
    }

    #[test]
    fn like_without_prefix_scans_index_keys() {
        let snapshot = users_snapshot();
        let plan = where_query("name LIKE '%son'")
            .optimize(&snapshot, &collation())
            .unwrap();
        match &plan.index {
            IndexStrategy::Scan { predicate, .. } => {
                assert_eq!(predicate.source(), "@ LIKE \"%son\"");
            }
            other => panic!("expected key scan, got {other:?}"),
        }
        assert!(plan.filters.is_empty());
    }

    #[test]
    fn not_equal_and_or_terms_stay_filters() {
        let snapshot = users_snapshot();
        let plan = where_query("name != 'ada'")
            .optimize(&snapshot, &collation())
            .unwrap();
        assert!(matches!(plan.index, IndexStrategy::All { .. }));
        assert_eq!(plan.filters.len(), 1);

        let plan = where_query("name = 'a' OR name = 'b'")
            .optimize(&snapshot, &collation())
            .unwrap();
        assert!(matches!(plan.index, IndexStrategy::All { .. }));
        assert_eq!(plan.filters.len(), 1);
    }

    #[test]
    fn all_quantified_terms_are_never_indexed() {
        let snapshot = InMemorySnapshot::new("users", 1_000).with_index(
            IndexDescriptor::new("tags_idx", "$.tags[*]", false)
                .unwrap()
                .with_key_count(5_000),
        );
        let plan = where_query("tags[*] ALL = 'x'")
            .optimize(&snapshot, &collation())
            .unwrap();
        assert!(matches!(plan.index, IndexStrategy::All { .. }));
        let plan = where_query("tags[*] ANY = 'x'")
            .optimize(&snapshot, &collation())
            .unwrap();
        assert!(matches!(plan.index, IndexStrategy::Equals { .. }));
    }

    #[test]
    fn any_equality_against_path_rewrites_to_in() {
        let snapshot = InMemorySnapshot::new("orders", 100);
        let mut query = Query::new();
        query
            .where_exprs
            .push(Expression::parse("ids[*] ANY = x.Id").unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        assert_eq!(plan.filters.len(), 1);
        assert_eq!(plan.filters[0].source(), "$.x.Id IN ARRAY($.ids[*])");
    }

    #[test]
    fn star_in_where_is_rejected() {
        let snapshot = InMemorySnapshot::new("users", 100);
        let err = where_query("COUNT(*._id) > 1")
            .optimize(&snapshot, &collation())
            .unwrap_err();
        assert_eq!(err.code(), "InvalidExpressionType");
    }

    #[test]
    fn non_predicate_where_is_rejected() {
        let snapshot = InMemorySnapshot::new("users", 100);
        let err = where_query("1 + 1")
            .optimize(&snapshot, &collation())
            .unwrap_err();
        assert_eq!(err.code(), "InvalidExpressionType");
    }

    #[test]
    fn term_splitting_is_idempotent() {
        let query = where_query("a = 1 AND (b = 2 AND c = 3)");
        let snapshot = InMemorySnapshot::new("users", 100);
        let coll = collation();
        let optimizer = QueryOptimizer::new(&snapshot, &query, &coll);
        let first = optimizer.split_where_terms().unwrap();
        let sources: Vec<&str> = first.iter().map(|t| t.source()).collect();
        assert_eq!(sources, vec!["$.a=1", "$.b=2", "$.c=3"]);
        let mut requery = Query::new();
        requery.where_exprs = first.clone();
        let coll2 = collation();
        let again = QueryOptimizer::new(&snapshot, &requery, &coll2)
            .split_where_terms()
            .unwrap();
        assert_eq!(
            again.iter().map(|t| t.source()).collect::<Vec<_>>(),
            sources
        );
    }

    #[test]
    fn order_by_matching_index_drops_the_sort() {
        let snapshot = users_snapshot();
        let mut query = Query::new();
        query.order_by = Some(Expression::parse("name").unwrap());
        query.order = Order::Descending;
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        assert!(plan.order_by.is_none());
        match &plan.index {
            IndexStrategy::All { name, order } => {
                assert_eq!(name, "name_idx");
                assert_eq!(*order, Order::Descending);
            }
            other => panic!("expected traversal over name_idx, got {other:?}"),
        }
    }

    #[test]
    fn order_by_without_matching_index_keeps_the_sort() {
        let snapshot = InMemorySnapshot::new("users", 100);
        let mut query = Query::new();
        query.order_by = Some(Expression::parse("age").unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        let order_by = plan.order_by.expect("sort survives");
        assert_eq!(order_by.expression.source(), "$.age");
    }

    #[test]
    fn group_by_injects_ascending_pre_sort() {
        let snapshot = InMemorySnapshot::new("users", 100);
        let mut query = Query::new();
        query.group_by = Some(Expression::parse("city").unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        let order_by = plan.order_by.expect("pre-sort injected");
        assert_eq!(order_by.expression.source(), "$.city");
        assert_eq!(order_by.order, Order::Ascending);
        assert!(plan.group_by.is_some());
    }

    #[test]
    fn group_by_on_indexed_expression_skips_the_pre_sort() {
        let snapshot = users_snapshot();
        let mut query = Query::new();
        query.group_by = Some(Expression::parse("name").unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        assert!(plan.order_by.is_none());
        match &plan.index {
            IndexStrategy::All { name, .. } => assert_eq!(name, "name_idx"),
            other => panic!("expected traversal over name_idx, got {other:?}"),
        }
    }

    #[test]
    fn group_by_conflicts_are_shape_errors() {
        let snapshot = InMemorySnapshot::new("users", 100);
        let mut query = Query::new();
        query.group_by = Some(Expression::parse("city").unwrap());
        query.order_by = Some(Expression::parse("age").unwrap());
        assert!(query.optimize(&snapshot, &collation()).is_err());

        let mut query = Query::new();
        query.group_by = Some(Expression::parse("city").unwrap());
        query.includes.push(Expression::parse("$.author").unwrap());
        assert!(query.optimize(&snapshot, &collation()).is_err());

        let mut query = Query::new();
        query.having = Some(Expression::parse("COUNT(@) > 1").unwrap());
        assert!(query.optimize(&snapshot, &collation()).is_err());
    }

    #[test]
    fn includes_partition_on_filter_and_order_usage() {
        let snapshot = InMemorySnapshot::new("posts", 100);
        let mut query = Query::new();
        query.includes.push(Expression::parse("$.author").unwrap());
        query.includes.push(Expression::parse("$.tags").unwrap());
        query
            .where_exprs
            .push(Expression::parse("author.name = 'ada'").unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        let before: Vec<&str> = plan.include_before.iter().map(|i| i.source()).collect();
        let after: Vec<&str> = plan.include_after.iter().map(|i| i.source()).collect();
        assert_eq!(before, vec!["$.author"]);
        assert_eq!(after, vec!["$.tags"]);
    }

    #[test]
    fn include_needed_before_reappears_after_a_sort() {
        let snapshot = InMemorySnapshot::new("posts", 100);
        let mut query = Query::new();
        query.includes.push(Expression::parse("$.author").unwrap());
        query
            .where_exprs
            .push(Expression::parse("author.name = 'ada'").unwrap());
        query.order_by = Some(Expression::parse("title").unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        assert_eq!(plan.include_before.len(), 1);
        assert_eq!(plan.include_after.len(), 1);
    }

    #[test]
    fn invalid_includes_are_rejected() {
        let snapshot = InMemorySnapshot::new("posts", 100);
        let mut query = Query::new();
        query.includes.push(Expression::parse("1 + 1").unwrap());
        let err = query.optimize(&snapshot, &collation()).unwrap_err();
        assert_eq!(err.code(), "InvalidExpressionType");
    }

    #[test]
    fn index_key_only_needs_the_single_indexed_field() {
        let snapshot = users_snapshot();
        let mut query = Query::new();
        query.select = Expression::parse("{n: name}").unwrap();
        query
            .where_exprs
            .push(Expression::parse("name = 'ada'").unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        assert!(plan.is_index_key_only);
        assert_eq!(plan.fields, vec!["name"]);

        let mut query = Query::new();
        query.select = Expression::parse("{n: name, a: age}").unwrap();
        query
            .where_exprs
            .push(Expression::parse("name = 'ada'").unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        assert!(!plan.is_index_key_only);
    }

    #[test]
    fn preferred_single_field_hint_reuses_an_index() {
        let snapshot = users_snapshot();
        let mut query = Query::new();
        query.select = Expression::parse("{n: name}").unwrap();
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        match &plan.index {
            IndexStrategy::All { name, .. } => assert_eq!(name, "name_idx"),
            other => panic!("expected traversal over name_idx, got {other:?}"),
        }
        assert!(plan.is_index_key_only);
    }

    #[test]
    fn virtual_sources_cost_nothing() {
        let snapshot = InMemorySnapshot::new("$dump", 0);
        let mut query = Query::new();
        query.virtual_source = true;
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        assert!(matches!(plan.index, IndexStrategy::Virtual));
        assert_eq!(plan.index_cost, 0);
    }

    #[test]
    fn parameters_feed_plan_time_values() {
        let snapshot = users_snapshot();
        let mut params = crate::document::Document::new();
        params.insert("who", Value::String("ada".into())).unwrap();
        let mut query = Query::new();
        query
            .where_exprs
            .push(Expression::parse_with("name = @who", params).unwrap());
        let plan = query.optimize(&snapshot, &collation()).unwrap();
        match &plan.index {
            IndexStrategy::Equals { values, .. } => {
                assert_eq!(values, &vec![Value::String("ada".into())]);
            }
            other => panic!("expected parameter-driven probe, got {other:?}"),
        }
    }
}
