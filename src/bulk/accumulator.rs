//! Bulk write accumulator with threshold-triggered auto-flush
//!
//! Operations are queued in append order. With a threshold `n` configured,
//! the append that brings the queue to `n` drains exactly those `n`
//! operations and sends them before returning, so the queue never holds `n`
//! operations across calls.
//!
//! The queue is drained before the request is sent. If the send fails the
//! drained operations are gone: the error from the append call means "this
//! batch may not have been delivered".

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::operation::{encode_operations, BulkAction, BulkOperation, BulkTarget};
use super::response::{BulkReport, BulkResponse};
use crate::client::Client;
use crate::document::{object_fields, ObjectBuilder};
use crate::errors::{SearchError, SearchResult};
use crate::observability::{Event, Logger};
use crate::transport::Transport;

const BULK_PATH: &str = "/_bulk";

/// Observer of auto-flush reports
pub type FlushCallback<'a> = Box<dyn FnMut(&BulkReport) + 'a>;

/// Client-side queue of bulk operations
pub struct BulkAccumulator<'a, T: Transport> {
    client: &'a Client<T>,
    queue: Vec<BulkOperation>,
    pending: Option<BulkOperation>,
    threshold: Option<usize>,
    default_index: Option<String>,
    on_flush: Option<FlushCallback<'a>>,
    auto_flushes: u64,
    flushed_items: u64,
    session_id: Uuid,
    logger: Logger,
}

impl<'a, T: Transport> BulkAccumulator<'a, T> {
    /// Accumulator using the client's `bulk_auto_flush` and `default_index`
    pub fn new(client: &'a Client<T>) -> Self {
        Self {
            client,
            queue: Vec::new(),
            pending: None,
            threshold: client.config().bulk_auto_flush.filter(|n| *n > 0),
            default_index: client.config().default_index.clone(),
            on_flush: None,
            auto_flushes: 0,
            flushed_items: 0,
            session_id: Uuid::new_v4(),
            logger: client.logger().clone(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Index used by targets that name none
    pub fn default_index(mut self, index: impl Into<String>) -> Self {
        self.default_index = Some(index.into());
        self
    }

    /// Flush automatically whenever `threshold` operations are queued (0 disables)
    pub fn auto_flush(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold).filter(|n| *n > 0);
        self
    }

    /// Observe each auto-flush report
    pub fn on_flush<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&BulkReport) + 'a,
    {
        self.on_flush = Some(Box::new(callback));
        self
    }

    // ==================
    // Appends
    // ==================

    /// Queue an `index` operation; the engine assigns an id when `id` is `None`
    pub fn index<S: Serialize + ?Sized>(&mut self, index: &str, id: Option<&str>, doc: &S) -> SearchResult<&mut Self> {
        let target = self.target(BulkAction::Index, index, id)?;
        let doc = object_fields(doc)?;
        self.append(BulkOperation::index(target, doc))
    }

    /// Queue a `create` operation (fails remotely if the document exists)
    pub fn create<S: Serialize + ?Sized>(&mut self, index: &str, id: &str, doc: &S) -> SearchResult<&mut Self> {
        let target = self.target(BulkAction::Create, index, Some(id))?;
        let doc = object_fields(doc)?;
        self.append(BulkOperation::create(target, doc))
    }

    /// Queue a partial `update`
    pub fn update<S: Serialize + ?Sized>(&mut self, index: &str, id: &str, doc: &S) -> SearchResult<&mut Self> {
        let target = self.target(BulkAction::Update, index, Some(id))?;
        let doc = object_fields(doc)?;
        self.append(BulkOperation::update(target, doc))
    }

    /// Queue an update that creates the document when missing
    pub fn upsert<S: Serialize + ?Sized>(&mut self, index: &str, id: &str, doc: &S) -> SearchResult<&mut Self> {
        let target = self.target(BulkAction::Update, index, Some(id))?;
        let doc = object_fields(doc)?;
        self.append(BulkOperation::upsert(target, doc))
    }

    pub fn delete(&mut self, index: &str, id: &str) -> SearchResult<&mut Self> {
        let target = self.target(BulkAction::Delete, index, Some(id))?;
        self.append(BulkOperation::delete(target))
    }

    // ==================
    // Incremental API
    // ==================

    /// Start an `index` operation filled by the `set*` calls that follow
    pub fn begin_index(&mut self, index: &str, id: Option<&str>) -> SearchResult<&mut Self> {
        let target = self.target(BulkAction::Index, index, id)?;
        self.begin(BulkOperation::index(target, Map::new()))
    }

    pub fn begin_create(&mut self, index: &str, id: &str) -> SearchResult<&mut Self> {
        let target = self.target(BulkAction::Create, index, Some(id))?;
        self.begin(BulkOperation::create(target, Map::new()))
    }

    pub fn begin_update(&mut self, index: &str, id: &str) -> SearchResult<&mut Self> {
        let target = self.target(BulkAction::Update, index, Some(id))?;
        self.begin(BulkOperation::update(target, Map::new()))
    }

    /// Set a field on the pending operation
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> SearchResult<&mut Self> {
        self.pending_doc()?.insert(key.into(), value.into());
        Ok(self)
    }

    pub fn set_object<F>(&mut self, key: impl Into<String>, build: F) -> SearchResult<&mut Self>
    where
        F: FnOnce(ObjectBuilder) -> ObjectBuilder,
    {
        let value = build(ObjectBuilder::new()).into_value();
        self.set(key, value)
    }

    pub fn set_array<I, V>(&mut self, key: impl Into<String>, values: I) -> SearchResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.set(key, Value::Array(values))
    }

    /// Merge the fields of a serializable value into the pending operation
    pub fn set_from<S: Serialize + ?Sized>(&mut self, data: &S) -> SearchResult<&mut Self> {
        let doc = self.pending_doc()?;
        doc.extend(object_fields(data)?);
        Ok(self)
    }

    // ==================
    // Submission
    // ==================

    /// Send everything queued; `None` when there was nothing to send
    pub fn flush(&mut self) -> SearchResult<Option<BulkReport>> {
        self.commit_pending()?;
        if self.queue.is_empty() {
            return Ok(None);
        }
        let batch = std::mem::take(&mut self.queue);
        self.submit(batch, false).map(Some)
    }

    /// Send everything queued; an empty queue is an `EmptyBatch` error
    pub fn send(&mut self) -> SearchResult<BulkReport> {
        self.flush()?.ok_or(SearchError::EmptyBatch)
    }

    /// Encode the queue without sending it
    ///
    /// Commits the pending operation first, which may trigger an auto-flush.
    pub fn render(&mut self) -> SearchResult<Vec<u8>> {
        self.commit_pending()?;
        encode_operations(&self.queue)
    }

    /// Queued operations, including one still being filled
    pub fn len(&self) -> usize {
        self.queue.len() + usize::from(self.pending.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything queued without sending
    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending = None;
    }

    /// Number of automatic drains so far
    pub fn auto_flush_count(&self) -> u64 {
        self.auto_flushes
    }

    /// Operations delivered in batches that got a response
    pub fn flushed_items(&self) -> u64 {
        self.flushed_items
    }

    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    // ==================
    // Internals
    // ==================

    fn target(&self, action: BulkAction, index: &str, id: Option<&str>) -> SearchResult<BulkTarget> {
        BulkTarget::resolve(action, index, id, self.default_index.as_deref())
    }

    fn append(&mut self, op: BulkOperation) -> SearchResult<&mut Self> {
        self.commit_pending()?;
        self.enqueue(op)?;
        Ok(self)
    }

    fn begin(&mut self, op: BulkOperation) -> SearchResult<&mut Self> {
        self.commit_pending()?;
        self.pending = Some(op);
        Ok(self)
    }

    fn pending_doc(&mut self) -> SearchResult<&mut Map<String, Value>> {
        self.pending
            .as_mut()
            .and_then(BulkOperation::doc_mut)
            .ok_or_else(|| SearchError::missing_field("pending operation"))
    }

    fn commit_pending(&mut self) -> SearchResult<()> {
        match self.pending.take() {
            Some(op) => self.enqueue(op),
            None => Ok(()),
        }
    }

    fn enqueue(&mut self, op: BulkOperation) -> SearchResult<()> {
        self.queue.push(op);
        self.auto_flush_if_full()
    }

    fn auto_flush_if_full(&mut self) -> SearchResult<()> {
        let threshold = match self.threshold {
            Some(n) => n,
            None => return Ok(()),
        };
        while self.queue.len() >= threshold {
            let batch: Vec<BulkOperation> = self.queue.drain(..threshold).collect();
            self.auto_flushes += 1;

            let session = self.session_id.to_string();
            let count = self.auto_flushes.to_string();
            self.logger.info(
                Event::BulkAutoFlush,
                &[("session_id", session.as_str()), ("auto_flushes", count.as_str())],
            );

            let report = self.submit(batch, true)?;
            if let Some(callback) = self.on_flush.as_mut() {
                callback(&report);
            }
        }
        Ok(())
    }

    fn submit(&mut self, batch: Vec<BulkOperation>, automatic: bool) -> SearchResult<BulkReport> {
        let submitted = batch.len();
        let body = encode_operations(&batch)?;
        let bytes = self.client.perform_ndjson_with(&self.logger, BULK_PATH, body)?;
        let response: BulkResponse = self.client.decode(&bytes)?;
        let report = BulkReport::from_response(submitted, response);

        self.flushed_items += submitted as u64;
        self.client
            .metrics()
            .record_bulk(submitted as u64, report.failure_count() as u64, automatic);

        let session = self.session_id.to_string();
        let items = submitted.to_string();
        let failed = report.failure_count().to_string();
        let took = report.took.to_string();
        self.logger.info(
            Event::BulkFlushed,
            &[
                ("session_id", session.as_str()),
                ("items", items.as_str()),
                ("failed", failed.as_str()),
                ("took_ms", took.as_str()),
                ("automatic", if automatic { "true" } else { "false" }),
            ],
        );

        if let Some(first) = report.failures.first() {
            let key = first.key();
            self.logger.warn(
                Event::BulkPartialFailure,
                &[
                    ("session_id", session.as_str()),
                    ("failed", failed.as_str()),
                    ("first_key", key.as_str()),
                    ("first_reason", first.reason.as_str()),
                ],
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::observability::Severity;
    use crate::transport::{MockTransport, TransportRequest};
    use serde_json::json;
    use std::cell::RefCell;

    /// Answers every `_bulk` with one success item per action line
    fn echo_bulk(request: &TransportRequest) -> SearchResult<Vec<u8>> {
        let lines = request.ndjson_lines();
        let mut items = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let (action, meta) = match lines[i].as_object().and_then(|o| o.iter().next()) {
                Some((action, meta)) => (action.clone(), meta.clone()),
                None => break,
            };
            let mut item = Map::new();
            item.insert(
                action.clone(),
                json!({"_index": meta["_index"], "_id": meta["_id"], "status": 200}),
            );
            items.push(Value::Object(item));
            i += if action == "delete" { 1 } else { 2 };
        }
        Ok(json!({"took": 1, "errors": false, "items": items}).to_string().into_bytes())
    }

    fn echo_client(config: ClientConfig) -> Client<MockTransport> {
        Client::with_config(MockTransport::with_handler(echo_bulk), config)
    }

    #[test]
    fn test_manual_send() {
        let client = echo_client(ClientConfig::default());
        let mut bulk = client.bulk();
        bulk.index("books", Some("1"), &json!({"title": "a"}))
            .unwrap()
            .delete("books", "2")
            .unwrap();
        assert_eq!(bulk.len(), 2);

        let report = bulk.send().unwrap();
        assert_eq!(report.submitted, 2);
        assert_eq!(report.success_count(), 2);
        assert!(bulk.is_empty());

        let req = client.transport().last_request().unwrap();
        assert_eq!(req.path, "/_bulk");
        assert_eq!(req.ndjson_lines().len(), 3);
    }

    #[test]
    fn test_send_empty_batch_fails() {
        let client = echo_client(ClientConfig::default());
        let mut bulk = client.bulk();
        assert!(matches!(bulk.send(), Err(SearchError::EmptyBatch)));
        assert!(bulk.flush().unwrap().is_none());
        assert_eq!(client.transport().request_count(), 0);
    }

    #[test]
    fn test_auto_flush_drains_threshold() {
        let client = echo_client(ClientConfig::default());
        let seen = RefCell::new(Vec::new());
        let mut bulk = client.bulk().auto_flush(3).on_flush(|report| seen.borrow_mut().push(report.submitted));

        for i in 0..7 {
            let id = i.to_string();
            bulk.index("books", Some(id.as_str()), &json!({"n": i})).unwrap();
            assert!(bulk.len() < 3);
        }

        assert_eq!(bulk.auto_flush_count(), 2);
        assert_eq!(bulk.len(), 1);
        assert_eq!(bulk.flushed_items(), 6);

        let last = bulk.flush().unwrap().unwrap();
        assert_eq!(last.submitted, 1);
        drop(bulk);

        assert_eq!(*seen.borrow(), vec![3, 3]);
        let snap = client.metrics().snapshot();
        assert_eq!(snap.bulk_items_submitted, 7);
        assert_eq!(snap.bulk_auto_flushes, 2);
    }

    #[test]
    fn test_threshold_from_config_and_default_index() {
        let config = ClientConfig::default().with_bulk_auto_flush(2).with_default_index("logs");
        let client = echo_client(config);
        let mut bulk = client.bulk();
        bulk.index("", None, &json!({"a": 1})).unwrap();
        bulk.index("", None, &json!({"a": 2})).unwrap();
        assert_eq!(bulk.auto_flush_count(), 1);

        let req = client.transport().last_request().unwrap();
        assert_eq!(req.ndjson_lines()[0], json!({"index": {"_index": "logs"}}));
    }

    #[test]
    fn test_missing_target_fields_fail_at_append() {
        let client = echo_client(ClientConfig::default());
        let mut bulk = client.bulk();
        let err = bulk.index("", Some("1"), &json!({})).err().unwrap();
        assert_eq!(err.to_string(), "Missing required field: index");
        let err = bulk.create("books", "", &json!({})).err().unwrap();
        assert_eq!(err.to_string(), "Missing required field: id");
        assert!(bulk.is_empty());
    }

    #[test]
    fn test_incremental_api() {
        let client = echo_client(ClientConfig::default());
        let mut bulk = client.bulk().default_index("users");

        bulk.begin_index("", Some("1"))
            .unwrap()
            .set("name", "ada")
            .unwrap()
            .set_object("address", |o| o.set("city", "london"))
            .unwrap()
            .set_array("tags", ["a", "b"])
            .unwrap();
        bulk.begin_update("", "2").unwrap().set("age", 37).unwrap();
        assert_eq!(bulk.len(), 2);

        let text = String::from_utf8(bulk.render().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"index":{"_index":"users","_id":"1"}}"#,
                r#"{"name":"ada","address":{"city":"london"},"tags":["a","b"]}"#,
                r#"{"update":{"_index":"users","_id":"2"}}"#,
                r#"{"doc":{"age":37}}"#,
            ]
        );
    }

    #[test]
    fn test_set_without_pending_operation_fails() {
        let client = echo_client(ClientConfig::default());
        let mut bulk = client.bulk();
        assert_eq!(bulk.set("a", 1).err().unwrap().code(), "SEARCH_MISSING_FIELD");

        bulk.index("books", None, &json!({})).unwrap();
        assert!(bulk.set("a", 1).is_err());
    }

    #[test]
    fn test_commit_runs_threshold_check() {
        let client = echo_client(ClientConfig::default());
        let mut bulk = client.bulk().auto_flush(2);
        bulk.begin_index("books", Some("1")).unwrap().set("a", 1).unwrap();
        bulk.begin_index("books", Some("2")).unwrap().set("a", 2).unwrap();
        assert_eq!(bulk.auto_flush_count(), 0);

        bulk.delete("books", "3").unwrap();
        assert_eq!(bulk.auto_flush_count(), 1);
        assert_eq!(bulk.len(), 1);
    }

    #[test]
    fn test_failed_auto_flush_drops_batch() {
        let transport = MockTransport::new();
        transport.push_reply(Err(SearchError::transport("connection reset")));
        let client = Client::new(transport);
        let mut bulk = client.bulk().auto_flush(2);

        bulk.index("books", Some("1"), &json!({})).unwrap();
        let err = bulk.index("books", Some("2"), &json!({})).err().unwrap();
        assert_eq!(err.code(), "SEARCH_TRANSPORT_FAILED");
        assert_eq!(bulk.len(), 0);
        assert_eq!(bulk.auto_flush_count(), 1);
        assert_eq!(bulk.flushed_items(), 0);
    }

    #[test]
    fn test_partial_failure_is_reported_not_raised() {
        let transport = MockTransport::new();
        transport.push_json(json!({
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_index": "books", "_id": "1", "status": 201, "result": "created"}},
                {"create": {"_index": "books", "_id": "2", "status": 409,
                    "error": {"type": "version_conflict_engine_exception", "reason": "exists"}}}
            ]
        }));
        let (logger, buffer) = Logger::memory(Severity::Info);
        let client = Client::new(transport);

        let mut bulk = client.bulk().with_logger(logger);
        bulk.index("books", Some("1"), &json!({})).unwrap();
        bulk.create("books", "2", &json!({})).unwrap();
        let report = bulk.send().unwrap();

        assert!(report.has_errors());
        assert_eq!(report.failures[0].key(), "books/2");
        assert_eq!(client.metrics().snapshot().bulk_items_failed, 1);

        let warnings = buffer.events(Event::BulkPartialFailure);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0]["first_key"], "books/2");
        assert_eq!(warnings[0]["session_id"], bulk.session_id().to_string().as_str());
    }

    #[test]
    fn test_clear_discards_queue() {
        let client = echo_client(ClientConfig::default());
        let mut bulk = client.bulk();
        bulk.index("books", None, &json!({})).unwrap();
        bulk.begin_create("books", "1").unwrap();
        assert_eq!(bulk.len(), 2);
        bulk.clear();
        assert!(bulk.is_empty());
    }
}
