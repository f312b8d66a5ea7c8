//! In-process transport for tests
//!
//! Records every request. Replies come from a handler closure when one is
//! installed, otherwise from a FIFO of canned replies.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{Transport, TransportRequest};
use crate::errors::{RemoteError, SearchError, SearchResult};

/// Reply function for `MockTransport::with_handler`
pub type MockHandler = Box<dyn FnMut(&TransportRequest) -> SearchResult<Vec<u8>> + Send>;

/// Scripted transport
pub struct MockTransport {
    handler: Mutex<Option<MockHandler>>,
    replies: Mutex<VecDeque<SearchResult<Vec<u8>>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Transport that answers from the reply queue
    pub fn new() -> Self {
        Self {
            handler: Mutex::new(None),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Transport that answers every request with `handler`
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: FnMut(&TransportRequest) -> SearchResult<Vec<u8>> + Send + 'static,
    {
        let transport = Self::new();
        *lock(&transport.handler) = Some(Box::new(handler));
        transport
    }

    /// Queue a successful JSON reply
    pub fn push_json(&self, value: Value) {
        lock(&self.replies).push_back(Ok(value.to_string().into_bytes()));
    }

    /// Queue a remote error reply
    pub fn push_error(&self, status: u16, body: Value) {
        let err = RemoteError::from_response(status, body.to_string().as_bytes());
        lock(&self.replies).push_back(Err(SearchError::Remote(err)));
    }

    /// Queue any reply
    pub fn push_reply(&self, reply: SearchResult<Vec<u8>>) {
        lock(&self.replies).push_back(reply);
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<TransportRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn last_request(&self) -> Option<TransportRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Replies still queued
    pub fn pending_replies(&self) -> usize {
        lock(&self.replies).len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &TransportRequest) -> SearchResult<Vec<u8>> {
        lock(&self.requests).push(request.clone());

        if let Some(handler) = lock(&self.handler).as_mut() {
            return handler(request);
        }

        lock(&self.replies).pop_front().unwrap_or_else(|| {
            Err(SearchError::transport(format!(
                "no reply queued for {} {}",
                request.method, request.path
            )))
        })
    }
}
