//! Client counters
//!
//! - Counters only, monotonic
//! - Relaxed atomics: builders borrow the client immutably

use std::sync::atomic::{AtomicU64, Ordering};

/// Request and batching counters for one client
#[derive(Debug, Default)]
pub struct ClientMetrics {
    requests_sent: AtomicU64,
    remote_errors: AtomicU64,
    transport_errors: AtomicU64,
    decode_errors: AtomicU64,
    scrolls_opened: AtomicU64,
    scrolls_released: AtomicU64,
    bulk_items_submitted: AtomicU64,
    bulk_items_failed: AtomicU64,
    bulk_auto_flushes: AtomicU64,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_remote_errors(&self) {
        self.remote_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transport_errors(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scrolls_opened(&self) {
        self.scrolls_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scrolls_released(&self) {
        self.scrolls_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one bulk round trip
    pub fn record_bulk(&self, submitted: u64, failed: u64, automatic: bool) {
        self.bulk_items_submitted.fetch_add(submitted, Ordering::Relaxed);
        self.bulk_items_failed.fetch_add(failed, Ordering::Relaxed);
        if automatic {
            self.bulk_auto_flushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            scrolls_opened: self.scrolls_opened.load(Ordering::Relaxed),
            scrolls_released: self.scrolls_released.load(Ordering::Relaxed),
            bulk_items_submitted: self.bulk_items_submitted.load(Ordering::Relaxed),
            bulk_items_failed: self.bulk_items_failed.load(Ordering::Relaxed),
            bulk_auto_flushes: self.bulk_auto_flushes.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the client counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub remote_errors: u64,
    pub transport_errors: u64,
    pub decode_errors: u64,
    pub scrolls_opened: u64,
    pub scrolls_released: u64,
    pub bulk_items_submitted: u64,
    pub bulk_items_failed: u64,
    pub bulk_auto_flushes: u64,
}

impl MetricsSnapshot {
    /// Scroll contexts opened but not yet released
    pub fn scrolls_outstanding(&self) -> u64 {
        self.scrolls_opened.saturating_sub(self.scrolls_released)
    }
}
