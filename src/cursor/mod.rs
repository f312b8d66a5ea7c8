//! Pagination cursors
//!
//! Two ways to walk a large result set:
//!
//! - `ScrollCursor`: server-side snapshot, token-driven, must be released
//! - `SortCursor`: stateless, keyed on the last row's sort values
//!
//! Both return a `Page`; an empty page means the data is exhausted.

mod page;
mod scroll;
mod search_after;

pub use page::Page;
pub use scroll::{ScrollCursor, ScrollState};
pub use search_after::{SortCursor, SortCursorState, SortPageRequest};
