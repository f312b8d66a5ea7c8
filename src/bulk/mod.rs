//! Bulk writes
//!
//! - `BulkOperation`: one tagged write and its newline-delimited lines
//! - `BulkAccumulator`: ordered queue with optional auto-flush
//! - `BulkReport`: per-item outcomes and failures of one flush

mod accumulator;
mod operation;
mod response;

pub use accumulator::{BulkAccumulator, FlushCallback};
pub use operation::{encode_operations, BulkAction, BulkOperation, BulkTarget};
pub use response::{BulkFailure, BulkItemError, BulkItemOutcome, BulkItemResponse, BulkReport, BulkResponse};
