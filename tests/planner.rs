//! Planner integration tests over the public API.

use vellum::{
    Collation, Expression, IndexDescriptor, IndexStrategy, Order, Query, QueryBuilder,
    QuerySnapshot, Value,
};
use vellum::query::InMemorySnapshot;

fn collation() -> Collation {
    Collation::binary()
}

fn snapshot_with(indexes: &[(&str, &str, bool, u64)]) -> InMemorySnapshot {
    let mut snapshot = InMemorySnapshot::new("col", 1_000);
    for (name, expr, unique, keys) in indexes {
        snapshot = snapshot.with_index(
            IndexDescriptor::new(*name, expr, *unique)
                .unwrap()
                .with_key_count(*keys),
        );
    }
    snapshot
}

#[test]
fn default_query_scans_the_primary_index() {
    let snapshot = InMemorySnapshot::new("col", 42);
    let plan = Query::new().optimize(&snapshot, &collation()).unwrap();
    match &plan.index {
        IndexStrategy::All { name, order } => {
            assert_eq!(name, "_id");
            assert_eq!(*order, Order::Ascending);
        }
        other => panic!("expected primary scan, got {other:?}"),
    }
    assert_eq!(plan.index_expression, "$._id");
    assert_eq!(plan.collection, "col");
    assert_eq!(plan.index_cost, 42);
}

#[test]
fn consumed_term_never_appears_in_filters() {
    let snapshot = snapshot_with(&[("age_idx", "$.age", false, 1_000)]);
    let query = QueryBuilder::new()
        .r#where(Expression::parse("age = 30").unwrap())
        .r#where(Expression::parse("name != 'x'").unwrap())
        .build()
        .unwrap();
    let plan = query.optimize(&snapshot, &collation()).unwrap();
    assert_eq!(plan.index_expression, "$.age");
    for filter in &plan.filters {
        assert_ne!(filter.source(), "$.age=30");
    }
    assert_eq!(plan.filters.len(), 1);
}

#[test]
fn index_key_only_implies_single_matching_field() {
    let snapshot = snapshot_with(&[("name_idx", "$.name", false, 1_000)]);
    let query = QueryBuilder::new()
        .select(Expression::parse("{n: name}").unwrap())
        .r#where(Expression::parse("name > 'm'").unwrap())
        .build()
        .unwrap();
    let plan = query.optimize(&snapshot, &collation()).unwrap();
    assert!(plan.is_index_key_only);
    assert_eq!(plan.fields.len(), 1);
    assert_eq!(format!("$.{}", plan.fields[0]), plan.index_expression);
}

#[test]
fn contains_pattern_rewrites_into_in() {
    let snapshot = InMemorySnapshot::new("col", 100);
    let query = QueryBuilder::new()
        .r#where(Expression::parse("ids[*] ANY = x.Id").unwrap())
        .build()
        .unwrap();
    let plan = query.optimize(&snapshot, &collation()).unwrap();
    let sources: Vec<&str> = plan.filters.iter().map(|f| f.source()).collect();
    assert_eq!(sources, vec!["$.x.Id IN ARRAY($.ids[*])"]);
}

#[test]
fn parameterized_in_list_drives_a_multi_key_probe() {
    let snapshot = snapshot_with(&[("id2", "$.Id", true, 1_000)]);
    let mut params = vellum::Document::new();
    params
        .insert(
            "0",
            Value::Array(vec![Value::Int32(1), Value::Int32(2)]),
        )
        .unwrap();
    let query = QueryBuilder::new()
        .r#where(Expression::parse_with("Id IN @0", params).unwrap())
        .build()
        .unwrap();
    let plan = query.optimize(&snapshot, &collation()).unwrap();
    match &plan.index {
        IndexStrategy::Equals { name, values } => {
            assert_eq!(name, "id2");
            assert_eq!(values, &vec![Value::Int32(1), Value::Int32(2)]);
        }
        other => panic!("expected multi-key probe, got {other:?}"),
    }
    assert_eq!(plan.index_cost, 2);
    assert!(plan.filters.is_empty());
}

#[test]
fn explain_round_trips_through_the_value_model() {
    let snapshot = snapshot_with(&[("age_idx", "$.age", false, 1_000)]);
    let query = QueryBuilder::new()
        .r#where(Expression::parse("age BETWEEN 20 AND 30").unwrap())
        .order_by(Expression::parse("name").unwrap(), Order::Descending)
        .limit(10)
        .build()
        .unwrap();
    let plan = query.optimize(&snapshot, &collation()).unwrap();
    let explain = plan.explain();
    assert_eq!(explain.get("collection"), Some(&Value::String("col".into())));
    let index = explain.get("index").and_then(Value::as_document).unwrap();
    assert_eq!(index.get("expr"), Some(&Value::String("$.age".into())));
    let order_by = explain.get("orderBy").and_then(Value::as_document).unwrap();
    assert_eq!(order_by.get("order"), Some(&Value::Int32(-1)));
    assert_eq!(explain.get("limit"), Some(&Value::Int64(10)));
    // Hash is stable for identical plans.
    let again = query.optimize(&snapshot, &collation()).unwrap();
    assert_eq!(plan.plan_hash(), again.plan_hash());
}

#[test]
fn snapshot_cost_overrides_feed_selection() {
    struct SkewedSnapshot(InMemorySnapshot);

    impl QuerySnapshot for SkewedSnapshot {
        fn collection_name(&self) -> &str {
            self.0.collection_name()
        }
        fn indexes(&self) -> Vec<IndexDescriptor> {
            self.0.indexes()
        }
        fn cost(&self, index: &IndexDescriptor, predicate: &vellum::query::cost::IndexPredicate) -> u64 {
            // Pretend the city index is pathologically skewed.
            if index.name == "city_idx" {
                1_000_000
            } else {
                self.0.cost(index, predicate)
            }
        }
    }

    let inner = snapshot_with(&[
        ("city_idx", "$.city", false, 10),
        ("age_idx", "$.age", false, 10_000),
    ]);
    let snapshot = SkewedSnapshot(inner);
    let query = QueryBuilder::new()
        .r#where(Expression::parse("city = 'rome'").unwrap())
        .r#where(Expression::parse("age = 30").unwrap())
        .build()
        .unwrap();
    let plan = query.optimize(&snapshot, &collation()).unwrap();
    match &plan.index {
        IndexStrategy::Equals { name, .. } => assert_eq!(name, "age_idx"),
        other => panic!("expected age probe, got {other:?}"),
    }
}

#[test]
fn group_by_having_flows_into_the_plan() {
    let snapshot = InMemorySnapshot::new("col", 100);
    let query = QueryBuilder::new()
        .select(Expression::parse("{city: @, n: COUNT(*)}").unwrap())
        .group_by(Expression::parse("city").unwrap())
        .having(Expression::parse("COUNT(*) > 1").unwrap())
        .build()
        .unwrap();
    let plan = query.optimize(&snapshot, &collation()).unwrap();
    let group_by = plan.group_by.expect("group by present");
    assert_eq!(group_by.expression.source(), "$.city");
    assert!(group_by.having.is_some());
    let pre_sort = plan.order_by.expect("pre-sort injected");
    assert_eq!(pre_sort.order, Order::Ascending);
}
