//! Transport seam
//!
//! The core never opens a socket. It hands a fully encoded request to a
//! `Transport` and gets raw response bytes back. Implementations own
//! connection pooling, TLS, authentication, retries and deadlines.
//!
//! # Contract
//!
//! - status < 400: return the body bytes
//! - status >= 400: return `SearchError::Remote(RemoteError::from_response(status, body))`
//! - no response at all: return `SearchError::Transport`

pub mod mock;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::errors::SearchResult;

pub use mock::MockTransport;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// A single JSON document
    Json,
    /// Newline-delimited action/payload pairs (bulk)
    NdJson,
}

impl ContentType {
    /// MIME type for the `Content-Type` header
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::NdJson => "application/x-ndjson",
        }
    }
}

/// Encoded request body
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub content_type: ContentType,
    pub bytes: Vec<u8>,
}

impl RequestBody {
    pub fn json(bytes: Vec<u8>) -> Self {
        Self {
            content_type: ContentType::Json,
            bytes,
        }
    }

    pub fn ndjson(bytes: Vec<u8>) -> Self {
        Self {
            content_type: ContentType::NdJson,
            bytes,
        }
    }

    /// Body as text, for logging
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A request ready for the wire
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Path plus optional query string, e.g. `/orders/_search?scroll=5m`
    pub path: String,
    pub body: Option<RequestBody>,
    /// Deadline hint for the transport; the core keeps no timers
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            timeout: None,
        }
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path without the query string
    pub fn endpoint(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    /// Value of a query-string parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        let (_, query) = self.path.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then_some(value)
        })
    }

    /// JSON body decoded back into a value
    pub fn json_body(&self) -> Option<Value> {
        match &self.body {
            Some(body) if body.content_type == ContentType::Json => {
                serde_json::from_slice(&body.bytes).ok()
            }
            _ => None,
        }
    }

    /// NDJSON body split into decoded lines
    pub fn ndjson_lines(&self) -> Vec<Value> {
        match &self.body {
            Some(body) if body.content_type == ContentType::NdJson => body
                .as_text()
                .lines()
                .filter(|line| !line.is_empty())
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Sends encoded requests and returns raw response bytes
pub trait Transport {
    fn send(&self, request: &TransportRequest) -> SearchResult<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &TransportRequest) -> SearchResult<Vec<u8>> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &TransportRequest) -> SearchResult<Vec<u8>> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &TransportRequest) -> SearchResult<Vec<u8>> {
        (**self).send(request)
    }
}
