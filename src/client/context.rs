//! Per-request context
//!
//! Carries the correlation id and start time of one round trip so the
//! request and response log lines can be matched up.

use std::time::Instant;

use uuid::Uuid;

use crate::transport::Method;

/// Context for a single transport round trip
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, present in every log line of the round trip
    pub request_id: Uuid,
    pub method: Method,
    pub path: String,
    started_at: Instant,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            method,
            path: path.into(),
            started_at: Instant::now(),
        }
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}
