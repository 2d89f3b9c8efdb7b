//! Integer cost model scoring `(index, predicate)` candidates.
//!
//! Costs approximate the number of index entries a probe touches,
//! derived from the descriptor's key statistic. Lower is better; the
//! optimizer keeps the cheapest candidate.

use crate::document::Value;
use crate::query::snapshot::IndexDescriptor;

/// Predicate shape offered to an index during planning.
#[derive(Clone, Debug)]
pub enum IndexPredicate {
    /// Probe one or more keys by equality (`=`, `IN`).
    Equals(Vec<Value>),
    /// Closed range (`BETWEEN a AND b`).
    Between(Value, Value),
    /// Open range upward (`>`, `>=`).
    Greater(Value),
    /// Open range downward (`<`, `<=`),
    Less(Value),
    /// Prefix range from `LIKE 'prefix%'`.
    LikePrefix(String),
    /// Predicate applied to every key during a full traversal.
    FullScan,
}

/// Estimated entries sharing one key, the per-key cost of an equality
/// probe.
pub fn estimated_duplicates(index: &IndexDescriptor) -> u64 {
    if index.unique {
        1
    } else {
        (index.key_count.max(1) / 10).max(1)
    }
}

/// Estimated entries touched when probing `index` with `predicate`.
pub fn estimate(index: &IndexDescriptor, predicate: &IndexPredicate) -> u64 {
    let keys = index.key_count.max(1);
    match predicate {
        IndexPredicate::Equals(values) => {
            estimated_duplicates(index).saturating_mul(values.len().max(1) as u64)
        }
        IndexPredicate::Between(_, _) => (keys / 5).max(1),
        IndexPredicate::Greater(_) | IndexPredicate::Less(_) => (keys / 2).max(1),
        IndexPredicate::LikePrefix(_) => (keys / 10).max(1),
        IndexPredicate::FullScan => keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(unique: bool, key_count: u64) -> IndexDescriptor {
        IndexDescriptor {
            name: "idx".into(),
            expression: "$.a".into(),
            unique,
            key_count,
        }
    }

    #[test]
    fn unique_equality_is_cheapest() {
        let idx = index(true, 10_000);
        assert_eq!(estimate(&idx, &IndexPredicate::Equals(vec![Value::Int32(1)])), 1);
    }

    #[test]
    fn in_lists_cost_per_key() {
        let idx = index(true, 10_000);
        let values = vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)];
        assert_eq!(estimate(&idx, &IndexPredicate::Equals(values)), 3);
    }

    #[test]
    fn ranges_beat_full_scans() {
        let idx = index(false, 10_000);
        let between = estimate(
            &idx,
            &IndexPredicate::Between(Value::Int32(1), Value::Int32(9)),
        );
        let half = estimate(&idx, &IndexPredicate::Greater(Value::Int32(1)));
        let full = estimate(&idx, &IndexPredicate::FullScan);
        assert!(between < half);
        assert!(half < full);
        assert_eq!(full, 10_000);
    }

    #[test]
    fn empty_indexes_still_cost_at_least_one() {
        let idx = index(false, 0);
        assert_eq!(estimate(&idx, &IndexPredicate::FullScan), 1);
    }
}
