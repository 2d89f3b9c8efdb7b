//! Fluent builder for [`Query`] values.
//!
//! The builder is purely structural: expressions are compiled by the
//! caller (so parse errors surface at the call site) and cross-clause
//! validation happens in [`QueryBuilder::build`].

use crate::error::{Error, Result};
use crate::expression::{ExprKind, Expression};
use crate::query::{Order, Query};

/// Builds a [`Query`] clause by clause.
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    query: Option<Query>,
}

impl QueryBuilder {
    /// Starts from the all-documents query.
    pub fn new() -> Self {
        QueryBuilder {
            query: Some(Query::new()),
        }
    }

    fn query(&mut self) -> &mut Query {
        self.query.get_or_insert_with(Query::new)
    }

    /// Appends a where-predicate; predicates combine conjunctively.
    pub fn r#where(mut self, predicate: Expression) -> Self {
        self.query().where_exprs.push(predicate);
        self
    }

    /// Sets the projection expression.
    pub fn select(mut self, select: Expression) -> Self {
        self.query().select = select;
        self
    }

    /// Adds a cross-collection include path.
    pub fn include(mut self, path: Expression) -> Self {
        self.query().includes.push(path);
        self
    }

    /// Sets the sort expression and direction.
    pub fn order_by(mut self, expression: Expression, order: Order) -> Self {
        let query = self.query();
        query.order_by = Some(expression);
        query.order = order;
        self
    }

    /// Sets the grouping key.
    pub fn group_by(mut self, expression: Expression) -> Self {
        self.query().group_by = Some(expression);
        self
    }

    /// Sets the group filter.
    pub fn having(mut self, predicate: Expression) -> Self {
        self.query().having = Some(predicate);
        self
    }

    /// Caps the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query().limit = limit;
        self
    }

    /// Skips the first `offset` results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query().offset = offset;
        self
    }

    /// Requests write locks during execution.
    pub fn for_update(mut self) -> Self {
        self.query().for_update = true;
        self
    }

    /// Validates cross-clause rules and returns the query.
    pub fn build(mut self) -> Result<Query> {
        let query = self.query.take().unwrap_or_default();
        for include in &query.includes {
            let single_field =
                include.kind() == ExprKind::Path && include.fields().len() == 1;
            if !single_field || include.fields()[0] == "$" {
                return Err(Error::InvalidExpressionType {
                    expression: include.source().to_owned(),
                    reason: "include requires a single-field path expression",
                });
            }
        }
        if query.having.is_some() && query.group_by.is_none() {
            return Err(Error::InvalidQuery("having requires group by"));
        }
        if query.group_by.is_some() && query.order_by.is_some() {
            return Err(Error::InvalidQuery("group by cannot be combined with order by"));
        }
        if query.group_by.is_some() && !query.includes.is_empty() {
            return Err(Error::InvalidQuery("group by cannot be combined with includes"));
        }
        Ok(query)
    }
}
