#![forbid(unsafe_code)]

//! Expression language and query planner core for an embedded,
//! single-file document database.
//!
//! The crate covers two subsystems. The [`expression`] module lexes,
//! parses, and compiles a path-and-predicate expression language into
//! immutable, shareable [`Expression`] values carrying the metadata
//! index selection needs (normalized source, referenced fields,
//! scalar/sequence shape, immutability). The [`query`] module turns a
//! structured [`Query`] plus a snapshot of a collection's indexes into
//! an executable [`QueryPlan`], choosing the cheapest index candidate
//! and partitioning the remaining work.
//!
//! Storage (pager, WAL, B-tree mechanics, document codec) lives
//! elsewhere and is consumed through the [`query::QuerySnapshot`]
//! trait.

pub mod document;
pub mod error;
pub mod expression;
pub mod query;

pub use crate::document::{Collation, Document, ObjectId, Value};
pub use crate::error::{Error, Result};
pub use crate::expression::{EvalContext, ExprKind, Expression};
pub use crate::query::{
    IndexDescriptor, IndexStrategy, Order, Query, QueryBuilder, QueryOptimizer, QueryPlan,
    QuerySnapshot,
};
