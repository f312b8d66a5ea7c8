//! Query construction
//!
//! - `Fragment`: one leaf clause
//! - `BoolQuery`: must/filter/should/must_not composition
//! - `BoolClauses`: clause shorthands shared by every query-bearing builder
//! - `SortSpec`: sort criteria

mod bool_query;
mod fragment;
mod sort;

pub use bool_query::{BoolClauses, BoolQuery, MinimumShouldMatch};
pub use fragment::{Fragment, RangeBounds};
pub use sort::{render_sort, SortOrder, SortSpec};
