//! searchkit - Request construction and pagination for document search engines
//!
//! Builders assemble bool queries, aggregation trees and bulk batches; two
//! cursors page through large result sets. Every round trip goes through a
//! `Transport` supplied by the caller.

pub mod aggregation;
pub mod bulk;
pub mod client;
pub mod config;
pub mod cursor;
pub mod document;
pub mod errors;
pub mod observability;
pub mod query;
pub mod search;
pub mod transport;

pub use aggregation::{AggClauses, AggTree};
pub use bulk::{BulkAccumulator, BulkReport};
pub use client::Client;
pub use config::{ClientConfig, KeepAlive};
pub use cursor::{Page, ScrollCursor, SortCursor, SortPageRequest};
pub use errors::{SearchError, SearchResult};
pub use query::{BoolClauses, BoolQuery, Fragment, SortOrder};
pub use transport::Transport;
