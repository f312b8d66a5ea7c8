//! Observable events
//!
//! Events are explicit and typed; the logger only ever prints one of these.

use std::fmt;

/// Observable client events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Requests
    /// Request handed to the transport
    RequestSent,
    /// Response bytes received
    ResponseReceived,
    /// Transport or remote failure
    RequestFailed,

    // Stateful cursor
    /// Server snapshot opened, first page fetched
    ScrollOpened,
    /// Next page fetched, token replaced
    ScrollAdvanced,
    /// Token released
    ScrollReleased,
    /// Release request failed (cursor still closed locally)
    ScrollReleaseFailed,

    // Sort cursor
    /// Page fetched, position recorded
    SortCursorAdvanced,
    /// Empty page fetched
    SortCursorExhausted,

    // Bulk
    /// Threshold reached, batch drained and sent
    BulkAutoFlush,
    /// Batch sent on request
    BulkFlushed,
    /// At least one item in a batch failed
    BulkPartialFailure,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RequestSent => "REQUEST_SENT",
            Event::ResponseReceived => "RESPONSE_RECEIVED",
            Event::RequestFailed => "REQUEST_FAILED",

            Event::ScrollOpened => "SCROLL_OPENED",
            Event::ScrollAdvanced => "SCROLL_ADVANCED",
            Event::ScrollReleased => "SCROLL_RELEASED",
            Event::ScrollReleaseFailed => "SCROLL_RELEASE_FAILED",

            Event::SortCursorAdvanced => "SORT_CURSOR_ADVANCED",
            Event::SortCursorExhausted => "SORT_CURSOR_EXHAUSTED",

            Event::BulkAutoFlush => "BULK_AUTO_FLUSH",
            Event::BulkFlushed => "BULK_FLUSHED",
            Event::BulkPartialFailure => "BULK_PARTIAL_FAILURE",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::RequestFailed | Event::ScrollReleaseFailed | Event::BulkPartialFailure
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
