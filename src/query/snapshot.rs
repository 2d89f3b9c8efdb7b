//! Read-only index snapshot consumed by the planner.
//!
//! The storage layer guarantees the index list observed during
//! planning does not change; the planner itself never blocks, never
//! retains page references, and only reads descriptor metadata.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::query::cost::{self, IndexPredicate};

/// Maximum index name length accepted by the engine.
pub const MAX_INDEX_NAME_LENGTH: usize = 32;

/// Planner-visible description of one collection index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index name, unique within the collection.
    pub name: String,
    /// Normalized source of the keyed expression (always scalar or
    /// ANY-flattened).
    pub expression: String,
    /// True when duplicate keys are rejected.
    pub unique: bool,
    /// Number of keys currently stored, for cost estimation.
    pub key_count: u64,
}

impl IndexDescriptor {
    /// Validates the name and the expression, storing the expression
    /// in normalized form.
    pub fn new(name: impl Into<String>, expression: &str, unique: bool) -> Result<Self> {
        let name = name.into();
        validate_index_name(&name)?;
        let compiled = Expression::parse_for_index(expression)?;
        Ok(IndexDescriptor {
            name,
            expression: compiled.source().to_owned(),
            unique,
            key_count: 0,
        })
    }

    /// The `_id` primary-key index every collection carries.
    pub fn primary(key_count: u64) -> Self {
        IndexDescriptor {
            name: "_id".into(),
            expression: "$._id".into(),
            unique: true,
            key_count,
        }
    }

    /// Sets the key statistic used by the cost model.
    pub fn with_key_count(mut self, key_count: u64) -> Self {
        self.key_count = key_count;
        self
    }
}

fn validate_index_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid || name.len() > MAX_INDEX_NAME_LENGTH {
        return Err(Error::InvalidIndexName(name.to_owned()));
    }
    Ok(())
}

/// Immutable view of a collection's indexes during planning.
pub trait QuerySnapshot {
    /// Name of the collection being planned.
    fn collection_name(&self) -> &str;

    /// Index descriptors visible to this snapshot; always contains the
    /// `_id` primary index.
    fn indexes(&self) -> Vec<IndexDescriptor>;

    /// Integer cost estimate for probing `index` with `predicate`.
    /// Storage layers can override this with real key statistics.
    fn cost(&self, index: &IndexDescriptor, predicate: &IndexPredicate) -> u64 {
        cost::estimate(index, predicate)
    }
}

/// In-memory snapshot used by tests and prototyping.
pub struct InMemorySnapshot {
    collection: String,
    indexes: Vec<IndexDescriptor>,
    // Lazily computed duplicate estimates per index name.
    duplicates: Mutex<HashMap<String, u64>>,
}

impl InMemorySnapshot {
    /// Snapshot with only the `_id` index over `document_count` keys.
    pub fn new(collection: impl Into<String>, document_count: u64) -> Self {
        InMemorySnapshot {
            collection: collection.into(),
            indexes: vec![IndexDescriptor::primary(document_count)],
            duplicates: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an additional index.
    pub fn with_index(mut self, descriptor: IndexDescriptor) -> Self {
        self.indexes.push(descriptor);
        self
    }
}

impl QuerySnapshot for InMemorySnapshot {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn indexes(&self) -> Vec<IndexDescriptor> {
        self.indexes.clone()
    }

    fn cost(&self, index: &IndexDescriptor, predicate: &IndexPredicate) -> u64 {
        if let IndexPredicate::Equals(values) = predicate {
            if !index.unique {
                let mut cache = self.duplicates.lock();
                let per_key = *cache
                    .entry(index.name.clone())
                    .or_insert_with(|| cost::estimated_duplicates(index));
                return per_key.saturating_mul(values.len().max(1) as u64);
            }
        }
        cost::estimate(index, predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_normalizes_its_expression() {
        let idx = IndexDescriptor::new("prices", "items[*].price", false).unwrap();
        assert_eq!(idx.expression, "MAP($.items[*]=>@.price)");
    }

    #[test]
    fn descriptor_rejects_bad_names() {
        for name in ["", "1st", "has space", "x".repeat(40).as_str()] {
            let err = IndexDescriptor::new(name, "$.a", false).unwrap_err();
            assert_eq!(err.code(), "InvalidIndexName", "name: {name:?}");
        }
    }

    #[test]
    fn descriptor_rejects_unstable_expressions() {
        let err = IndexDescriptor::new("bad", "@0", false).unwrap_err();
        assert_eq!(err.code(), "InvalidExpressionType");
    }

    #[test]
    fn snapshot_always_carries_primary_index() {
        let snapshot = InMemorySnapshot::new("users", 100);
        let indexes = snapshot.indexes();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "_id");
        assert_eq!(indexes[0].expression, "$._id");
        assert!(indexes[0].unique);
    }
}
