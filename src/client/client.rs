//! Client core
//!
//! Every builder funnels its round trips through `Client::perform`, which
//! encodes the body, logs the request, hands it to the transport, counts the
//! outcome and logs the response. Decoding goes through `Client::decode` so
//! decode failures are counted the same way.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::context::RequestContext;
use crate::bulk::BulkAccumulator;
use crate::config::ClientConfig;
use crate::cursor::{ScrollCursor, SortCursor};
use crate::document::{DocumentBuilder, MGetBuilder};
use crate::errors::{ErrorCategory, SearchError, SearchResult};
use crate::observability::{ClientMetrics, Event, Logger, Severity};
use crate::search::{AggregationBuilder, DeleteByQueryBuilder, SearchBuilder, UpdateByQueryBuilder};
use crate::transport::{Method, RequestBody, Transport, TransportRequest};

/// Search engine client
///
/// Owns the transport, configuration, logger and counters. Builders borrow
/// the client immutably, so any number of them may be alive at once.
pub struct Client<T: Transport> {
    transport: T,
    config: ClientConfig,
    logger: Logger,
    metrics: ClientMetrics,
}

impl<T: Transport> Client<T> {
    /// Client with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Client with an explicit configuration; the logger follows `log_level`
    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        let logger = Logger::from_level(config.log_level);
        Self {
            transport,
            config,
            logger,
            metrics: ClientMetrics::new(),
        }
    }

    /// Replace the client-wide logger
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ==================
    // Builders
    // ==================

    /// Search one or more indices (comma separated)
    pub fn search(&self, index: impl Into<String>) -> SearchBuilder<'_, T> {
        SearchBuilder::new(self, index)
    }

    /// Aggregation-only search
    pub fn aggregate(&self, index: impl Into<String>) -> AggregationBuilder<'_, T> {
        AggregationBuilder::new(self, index)
    }

    /// Stateful cursor over a server-side snapshot
    pub fn scroll(&self, index: impl Into<String>) -> ScrollCursor<'_, T> {
        ScrollCursor::new(self, index)
    }

    /// Stateless cursor driven by sort values
    pub fn search_after(&self, index: impl Into<String>) -> SortCursor<'_, T> {
        SortCursor::new(self, index)
    }

    /// Bulk accumulator seeded from the configured default index and threshold
    pub fn bulk(&self) -> BulkAccumulator<'_, T> {
        BulkAccumulator::new(self)
    }

    /// Single-document operations
    pub fn document(&self, index: impl Into<String>) -> DocumentBuilder<'_, T> {
        DocumentBuilder::new(self, index)
    }

    /// Multi-get
    pub fn mget(&self, index: impl Into<String>) -> MGetBuilder<'_, T> {
        MGetBuilder::new(self, index)
    }

    pub fn delete_by_query(&self, index: impl Into<String>) -> DeleteByQueryBuilder<'_, T> {
        DeleteByQueryBuilder::new(self, index)
    }

    pub fn update_by_query(&self, index: impl Into<String>) -> UpdateByQueryBuilder<'_, T> {
        UpdateByQueryBuilder::new(self, index)
    }

    // ==================
    // Round trips
    // ==================

    /// Send a JSON request using the client logger
    pub fn perform_json(&self, method: Method, path: &str, body: Option<&Value>) -> SearchResult<Vec<u8>> {
        self.perform_json_with(&self.logger, method, path, body)
    }

    /// Send a JSON request, logging through `logger`
    pub fn perform_json_with(
        &self,
        logger: &Logger,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> SearchResult<Vec<u8>> {
        let mut request = TransportRequest::new(method, path);
        if let Some(body) = body {
            request = request.with_body(RequestBody::json(encode(body)?));
        }
        self.perform(logger, request)
    }

    /// Send newline-delimited bytes using the client logger
    pub fn perform_ndjson(&self, path: &str, bytes: Vec<u8>) -> SearchResult<Vec<u8>> {
        self.perform_ndjson_with(&self.logger, path, bytes)
    }

    /// Send newline-delimited bytes, logging through `logger`
    pub fn perform_ndjson_with(&self, logger: &Logger, path: &str, bytes: Vec<u8>) -> SearchResult<Vec<u8>> {
        let request = TransportRequest::new(Method::Post, path).with_body(RequestBody::ndjson(bytes));
        self.perform(logger, request)
    }

    /// Decode response bytes
    pub fn decode<R: DeserializeOwned>(&self, bytes: &[u8]) -> SearchResult<R> {
        serde_json::from_slice(bytes).map_err(|e| {
            self.metrics.increment_decode_errors();
            SearchError::Decode(e)
        })
    }

    fn perform(&self, logger: &Logger, request: TransportRequest) -> SearchResult<Vec<u8>> {
        let request = request.with_timeout(self.config.request_timeout());
        let ctx = RequestContext::new(request.method, request.path.clone());
        let request_id = ctx.request_id.to_string();
        let trace = logger.enabled(Severity::Trace);

        let request_body = match (&request.body, trace) {
            (Some(body), true) => Some(body.as_text()),
            _ => None,
        };
        let mut fields = vec![
            ("request_id", request_id.as_str()),
            ("method", request.method.as_str()),
            ("path", request.path.as_str()),
        ];
        if let Some(body) = &request_body {
            fields.push(("body", body.as_str()));
        }
        logger.info(Event::RequestSent, &fields);

        self.metrics.increment_requests();
        let outcome = self.transport.send(&request);
        let duration_ms = ctx.elapsed_ms().to_string();

        match outcome {
            Ok(bytes) => {
                let size = bytes.len().to_string();
                let response_body = trace.then(|| String::from_utf8_lossy(&bytes).into_owned());
                let mut fields = vec![
                    ("request_id", request_id.as_str()),
                    ("duration_ms", duration_ms.as_str()),
                    ("bytes", size.as_str()),
                ];
                if let Some(body) = &response_body {
                    fields.push(("body", body.as_str()));
                }
                logger.info(Event::ResponseReceived, &fields);
                Ok(bytes)
            }
            Err(err) => {
                match err.category() {
                    ErrorCategory::Remote => self.metrics.increment_remote_errors(),
                    ErrorCategory::Transport => self.metrics.increment_transport_errors(),
                    _ => {}
                }
                let status = err
                    .as_remote()
                    .map(|remote| remote.status.to_string())
                    .unwrap_or_default();
                let message = err.to_string();
                logger.error(
                    Event::RequestFailed,
                    &[
                        ("request_id", request_id.as_str()),
                        ("duration_ms", duration_ms.as_str()),
                        ("code", err.code()),
                        ("status", status.as_str()),
                        ("error", message.as_str()),
                    ],
                );
                Err(err)
            }
        }
    }
}

/// Encode a request body
pub(crate) fn encode<S: Serialize + ?Sized>(value: &S) -> SearchResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(SearchError::Encode)
}

/// `/{index}/{endpoint}`
pub(crate) fn index_path(index: &str, endpoint: &str) -> String {
    format!("/{}/{}", index, endpoint)
}
