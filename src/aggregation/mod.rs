//! Aggregation construction
//!
//! `AggTree` holds named metric, bucket and pipeline clauses; children are
//! attached to a parent by name and render under its `aggs` key.

mod node;
mod tree;

pub use node::{AggKind, AggNode};
pub use tree::{AggClauses, AggTree};
