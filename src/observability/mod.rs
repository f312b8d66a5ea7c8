//! Observability for searchkit
//!
//! - Structured JSON logging through an explicit `Logger` value
//! - Typed events
//! - Monotonic client counters
//!
//! Observability is read-only: nothing here changes what is sent or how a
//! response is interpreted.
//!
//! # Usage
//!
//! ```ignore
//! use searchkit::observability::{Logger, Severity};
//!
//! // Request/response bodies for one builder only
//! let (logger, buffer) = Logger::memory(Severity::Trace);
//! let response = client.search("orders").with_logger(logger).term("status", "paid").execute()?;
//! println!("{}", buffer.contents());
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{LogBuffer, LogSink, Logger, Severity};
pub use metrics::{ClientMetrics, MetricsSnapshot};
