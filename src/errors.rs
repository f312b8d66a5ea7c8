//! Error types for searchkit
//!
//! Every failure maps onto one of four categories:
//! - Usage: invalid cursor transitions, empty batches, missing builder fields
//! - Remote: any 4xx/5xx answer from the search engine
//! - Decode: response bytes that do not match the expected shape
//! - Transport: the collaborator could not deliver the request
//!
//! Errors are never retried or swallowed by this crate. Partial bulk failures
//! are not errors at all; they are reported as data in `BulkReport`.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Result type for all searchkit operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected locally, fail fast
    Usage,
    /// Reported by the remote engine
    Remote,
    /// Malformed response bytes
    Decode,
    /// Delivery failure below the protocol
    Transport,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Usage => "USAGE",
            ErrorCategory::Remote => "REMOTE",
            ErrorCategory::Decode => "DECODE",
            ErrorCategory::Transport => "TRANSPORT",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// searchkit errors
#[derive(Debug, Error)]
pub enum SearchError {
    // ==================
    // Usage errors
    // ==================
    /// Operation not allowed in the cursor's current state
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Sort cursor has reached its last page
    #[error("No more data: cursor is exhausted")]
    NoMoreData,

    /// Bulk submission with nothing queued
    #[error("Bulk batch is empty")]
    EmptyBatch,

    /// Required builder field was not provided
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ==================
    // Remote errors
    // ==================
    /// Error envelope returned by the engine
    #[error("{0}")]
    Remote(#[from] RemoteError),

    // ==================
    // Decode errors
    // ==================
    /// Response body is not valid for the expected type
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response body decoded but lacks a required element
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request body could not be encoded
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    // ==================
    // Transport errors
    // ==================
    /// Request never produced a response
    #[error("Transport failure: {0}")]
    Transport(String),
}

impl SearchError {
    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        SearchError::InvalidState { operation, state }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        SearchError::MissingField(field.into())
    }

    /// Create a malformed response error
    pub fn malformed(reason: impl Into<String>) -> Self {
        SearchError::MalformedResponse(reason.into())
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        SearchError::Transport(reason.into())
    }

    /// Returns the stable string code for this error
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::InvalidState { .. } => "SEARCH_INVALID_STATE",
            SearchError::NoMoreData => "SEARCH_NO_MORE_DATA",
            SearchError::EmptyBatch => "SEARCH_EMPTY_BATCH",
            SearchError::MissingField(_) => "SEARCH_MISSING_FIELD",
            SearchError::Config(_) => "SEARCH_INVALID_CONFIG",
            SearchError::Remote(_) => "SEARCH_REMOTE_ERROR",
            SearchError::Decode(_) => "SEARCH_DECODE_FAILED",
            SearchError::MalformedResponse(_) => "SEARCH_MALFORMED_RESPONSE",
            SearchError::Encode(_) => "SEARCH_ENCODE_FAILED",
            SearchError::Transport(_) => "SEARCH_TRANSPORT_FAILED",
        }
    }

    /// Returns the category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            SearchError::InvalidState { .. }
            | SearchError::NoMoreData
            | SearchError::EmptyBatch
            | SearchError::MissingField(_)
            | SearchError::Config(_)
            | SearchError::Encode(_) => ErrorCategory::Usage,
            SearchError::Remote(_) => ErrorCategory::Remote,
            SearchError::Decode(_) | SearchError::MalformedResponse(_) => ErrorCategory::Decode,
            SearchError::Transport(_) => ErrorCategory::Transport,
        }
    }

    /// Returns the remote error, if this is one
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            SearchError::Remote(remote) => Some(remote),
            _ => None,
        }
    }

    /// Returns true for a remote 404
    pub fn is_not_found(&self) -> bool {
        self.as_remote().map(RemoteError::is_not_found).unwrap_or(false)
    }
}

/// Error reported by the search engine for a status >= 400
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    /// HTTP status code
    pub status: u16,
    /// `error.type` from the envelope
    pub error_type: Option<String>,
    /// `error.reason` from the envelope
    pub reason: Option<String>,
    /// `error.root_cause` from the envelope
    pub root_cause: Vec<Value>,
    /// Undecoded response body
    pub raw_body: Vec<u8>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: EnvelopeBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnvelopeBody {
    Detailed {
        #[serde(rename = "type", default)]
        error_type: Option<String>,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        root_cause: Vec<Value>,
    },
    Plain(String),
}

impl RemoteError {
    /// Build a remote error from a status code and response body.
    ///
    /// Bodies without the `{"error": ...}` envelope keep only the status and
    /// raw bytes.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let mut err = Self {
            status,
            error_type: None,
            reason: None,
            root_cause: Vec::new(),
            raw_body: body.to_vec(),
        };

        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope {
                error:
                    EnvelopeBody::Detailed {
                        error_type,
                        reason,
                        root_cause,
                    },
            }) => {
                err.error_type = error_type;
                err.reason = reason;
                err.root_cause = root_cause;
            }
            Ok(ErrorEnvelope {
                error: EnvelopeBody::Plain(reason),
            }) => {
                err.reason = Some(reason);
            }
            Err(_) => {}
        }

        err
    }

    /// Returns true for status 404
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Returns true for status 409
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }

    /// Returns true for status 400
    pub fn is_bad_request(&self) -> bool {
        self.status == 400
    }

    /// Returns true for status 408 or a timeout exception
    pub fn is_timeout(&self) -> bool {
        self.status == 408 || self.error_type.as_deref() == Some("timeout_exception")
    }

    /// Decode the raw body as JSON, if it is JSON
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.raw_body).ok()
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Remote error [{}]: {} - {}",
            self.status,
            self.error_type.as_deref().unwrap_or("unknown"),
            self.reason.as_deref().unwrap_or("no reason given")
        )
    }
}

impl std::error::Error for RemoteError {}
