//! Shared harness for integration tests
//!
//! `FakeEngine` is an in-memory search engine behind the `Transport` trait.
//! It speaks the slice of the wire protocol the client uses:
//! - `_search` with `from`/`size`, sort and `search_after`
//! - stateful cursors (open, advance, release), one token per page
//! - `_bulk` with injectable per-id failures
//! - single-document endpoints, `_mget`, `_count`, `_delete_by_query`

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use serde_json::{json, Map, Value};

use searchkit::errors::{RemoteError, SearchError, SearchResult};
use searchkit::transport::{Method, Transport, TransportRequest};
use searchkit::{Client, ClientConfig};

type Reply = Result<Value, (u16, Value)>;

#[derive(Debug, Clone)]
struct Stored {
    source: Value,
    version: u64,
}

#[derive(Debug)]
struct ScrollContext {
    token: String,
    rows: Vec<(String, String, Value)>,
    offset: usize,
    size: usize,
    pages: u64,
}

#[derive(Debug, Default)]
struct EngineState {
    indices: BTreeMap<String, BTreeMap<String, Stored>>,
    scrolls: BTreeMap<u64, ScrollContext>,
    next_scroll: u64,
    next_auto_id: u64,
    failing_ids: BTreeSet<String>,
    bulk_batches: Vec<usize>,
    transport_failures: usize,
    requests: usize,
}

/// In-memory engine
#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert `count` documents `doc-0000`.. with fields `n`, `group`, `even`
    pub fn seed(&self, index: &str, count: usize) {
        for n in 0..count {
            let source = json!({"n": n, "group": format!("g{}", n % 3), "even": n % 2 == 0});
            self.insert(index, &format!("doc-{:04}", n), source);
        }
    }

    pub fn insert(&self, index: &str, id: &str, source: Value) {
        self.lock()
            .indices
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), Stored { source, version: 1 });
    }

    /// Make bulk items targeting these ids fail with a conflict
    pub fn fail_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().failing_ids.extend(ids.into_iter().map(Into::into));
    }

    /// Fail the next `n` requests before they reach the engine
    pub fn fail_next_requests(&self, n: usize) {
        self.lock().transport_failures = n;
    }

    /// Drop every scroll context, as keep-alive expiry would
    pub fn expire_scrolls(&self) {
        self.lock().scrolls.clear();
    }

    pub fn open_scrolls(&self) -> usize {
        self.lock().scrolls.len()
    }

    /// Item count of every `_bulk` request received
    pub fn bulk_batches(&self) -> Vec<usize> {
        self.lock().bulk_batches.clone()
    }

    pub fn doc(&self, index: &str, id: &str) -> Option<Value> {
        self.lock()
            .indices
            .get(index)
            .and_then(|docs| docs.get(id))
            .map(|stored| stored.source.clone())
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.lock().indices.get(index).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests
    }
}

impl Transport for FakeEngine {
    fn send(&self, request: &TransportRequest) -> SearchResult<Vec<u8>> {
        let mut state = self.lock();
        state.requests += 1;
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(SearchError::transport("connection reset by peer"));
        }

        match state.route(request) {
            Ok(_) if request.method == Method::Head => Ok(Vec::new()),
            Ok(body) => Ok(body.to_string().into_bytes()),
            Err((status, body)) => {
                let bytes = if request.method == Method::Head {
                    Vec::new()
                } else {
                    body.to_string().into_bytes()
                };
                Err(SearchError::Remote(RemoteError::from_response(status, &bytes)))
            }
        }
    }
}

/// Client over a fresh engine
pub fn engine_client(config: ClientConfig) -> Client<FakeEngine> {
    Client::with_config(FakeEngine::new(), config)
}

// =============================================================================
// Routing
// =============================================================================

fn error(status: u16, error_type: &str, reason: &str) -> (u16, Value) {
    (
        status,
        json!({"error": {"type": error_type, "reason": reason, "root_cause": []}, "status": status}),
    )
}

impl EngineState {
    fn route(&mut self, request: &TransportRequest) -> Reply {
        let body = request.json_body().unwrap_or(Value::Null);
        let segments: Vec<&str> = request.endpoint().trim_start_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["_search", "scroll"]) => self.advance_scroll(&body),
            (Method::Delete, ["_search", "scroll"]) => self.release_scroll(&body),
            (Method::Post, ["_bulk"]) => self.bulk(&request.ndjson_lines()),
            (Method::Post, [index, "_search"]) => match request.query_param("scroll") {
                Some(_) => self.open_scroll(index, &body),
                None => self.search(index, &body),
            },
            (Method::Post, [index, "_count"]) => {
                let count = self.matching(index, body.get("query")).len();
                Ok(json!({"count": count, "_shards": {"total": 1, "successful": 1, "failed": 0}}))
            }
            (Method::Post, [index, "_mget"]) => Ok(self.mget(index, &body)),
            (Method::Post, [index, "_delete_by_query"]) => Ok(self.delete_by_query(index, &body)),
            (Method::Post, [index, "_doc"]) => {
                self.next_auto_id += 1;
                let id = format!("auto-{}", self.next_auto_id);
                Ok(self.put(index, &id, body))
            }
            (Method::Put, [index, "_doc", id]) => Ok(self.put(index, id, body)),
            (Method::Put, [index, "_create", id]) => {
                if self.stored(index, id).is_some() {
                    return Err(error(409, "version_conflict_engine_exception", "document already exists"));
                }
                Ok(self.put(index, id, body))
            }
            (Method::Post, [index, "_update", id]) => self.update(index, id, &body),
            (Method::Get, [index, "_doc", id]) | (Method::Head, [index, "_doc", id]) => self.get(index, id),
            (Method::Delete, [index, "_doc", id]) => self.delete(index, id),
            _ => Err(error(400, "illegal_argument_exception", "unsupported endpoint")),
        }
    }

    fn stored(&self, index: &str, id: &str) -> Option<&Stored> {
        self.indices.get(index).and_then(|docs| docs.get(id))
    }

    fn put(&mut self, index: &str, id: &str, source: Value) -> Value {
        let docs = self.indices.entry(index.to_string()).or_default();
        let (version, result) = match docs.get(id) {
            Some(existing) => (existing.version + 1, "updated"),
            None => (1, "created"),
        };
        docs.insert(id.to_string(), Stored { source, version });
        written(index, id, version, result)
    }

    fn update(&mut self, index: &str, id: &str, body: &Value) -> Reply {
        let doc = match body.get("doc") {
            Some(Value::Object(doc)) => doc.clone(),
            _ => return Err(error(400, "illegal_argument_exception", "only partial documents are supported")),
        };
        let upsert = body.get("doc_as_upsert") == Some(&Value::Bool(true));
        match self.stored(index, id).cloned() {
            Some(mut stored) => {
                if let Value::Object(fields) = &mut stored.source {
                    fields.extend(doc);
                }
                let version = stored.version + 1;
                stored.version = version;
                self.indices.entry(index.to_string()).or_default().insert(id.to_string(), stored);
                Ok(written(index, id, version, "updated"))
            }
            None if upsert => Ok(self.put(index, id, Value::Object(doc))),
            None => Err(error(404, "document_missing_exception", &format!("[{}]: document missing", id))),
        }
    }

    fn get(&self, index: &str, id: &str) -> Reply {
        if !self.indices.contains_key(index) {
            return Err(error(404, "index_not_found_exception", "no such index"));
        }
        match self.stored(index, id) {
            Some(stored) => Ok(json!({
                "_index": index, "_id": id, "_version": stored.version,
                "found": true, "_source": stored.source
            })),
            None => Err((404, json!({"_index": index, "_id": id, "found": false}))),
        }
    }

    fn delete(&mut self, index: &str, id: &str) -> Reply {
        let removed = self.indices.get_mut(index).and_then(|docs| docs.remove(id));
        match removed {
            Some(stored) => Ok(written(index, id, stored.version + 1, "deleted")),
            None => Err((404, json!({"_index": index, "_id": id, "result": "not_found"}))),
        }
    }

    fn mget(&self, index: &str, body: &Value) -> Value {
        let ids = body.get("ids").and_then(Value::as_array).cloned().unwrap_or_default();
        let docs: Vec<Value> = ids
            .iter()
            .filter_map(Value::as_str)
            .map(|id| match self.stored(index, id) {
                Some(stored) => json!({"_index": index, "_id": id, "_version": stored.version,
                                       "found": true, "_source": stored.source}),
                None => json!({"_index": index, "_id": id, "found": false}),
            })
            .collect();
        json!({"docs": docs})
    }

    fn delete_by_query(&mut self, index: &str, body: &Value) -> Value {
        let ids: Vec<String> = self
            .matching(index, body.get("query"))
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        if let Some(docs) = self.indices.get_mut(index) {
            for id in &ids {
                docs.remove(id);
            }
        }
        json!({"took": 1, "timed_out": false, "total": ids.len(), "deleted": ids.len(),
               "batches": 1, "version_conflicts": 0, "noops": 0, "failures": []})
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    fn matching(&self, index: &str, query: Option<&Value>) -> Vec<(String, Value)> {
        self.indices
            .get(index)
            .map(|docs| {
                docs.iter()
                    .filter(|(id, stored)| matches(query, id, &stored.source))
                    .map(|(id, stored)| (id.clone(), stored.source.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn search(&self, index: &str, body: &Value) -> Reply {
        let rows = self.matching(index, body.get("query"));
        let total = rows.len();
        let sort = parse_sort(body.get("sort"));
        let mut keyed: Vec<(String, Value, Vec<Value>)> = rows
            .into_iter()
            .map(|(id, source)| {
                let key = sort_key(&sort, &id, &source);
                (id, source, key)
            })
            .collect();
        keyed.sort_by(|a, b| compare_keys(&sort, &a.2, &b.2).then_with(|| a.0.cmp(&b.0)));

        if let Some(after) = body.get("search_after").and_then(Value::as_array) {
            keyed.retain(|row| compare_keys(&sort, &row.2, after) == Ordering::Greater);
        }

        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let include_sort = body.get("sort").is_some();

        let hits: Vec<Value> = keyed
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, source, key)| {
                let mut hit = json!({"_index": index, "_id": id, "_score": null, "_source": source});
                if include_sort {
                    hit["sort"] = Value::Array(key);
                }
                hit
            })
            .collect();
        Ok(search_response(total, hits, None))
    }

    fn open_scroll(&mut self, index: &str, body: &Value) -> Reply {
        let rows: Vec<(String, String, Value)> = self
            .matching(index, body.get("query"))
            .into_iter()
            .map(|(id, source)| (index.to_string(), id, source))
            .collect();
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;

        self.next_scroll += 1;
        let ctx_id = self.next_scroll;
        let mut ctx = ScrollContext {
            token: String::new(),
            rows,
            offset: 0,
            size,
            pages: 0,
        };
        let reply = next_page(ctx_id, &mut ctx);
        self.scrolls.insert(ctx_id, ctx);
        Ok(reply)
    }

    fn advance_scroll(&mut self, body: &Value) -> Reply {
        let token = body.get("scroll_id").and_then(Value::as_str).unwrap_or_default();
        let found = self.scrolls.iter_mut().find(|(_, ctx)| ctx.token == token);
        match found {
            Some((ctx_id, ctx)) => Ok(next_page(*ctx_id, ctx)),
            None => Err(error(404, "search_context_missing_exception", "No search context found")),
        }
    }

    fn release_scroll(&mut self, body: &Value) -> Reply {
        let token = body.get("scroll_id").and_then(Value::as_str).unwrap_or_default();
        let ctx_id = self
            .scrolls
            .iter()
            .find(|(_, ctx)| ctx.token == token)
            .map(|(ctx_id, _)| *ctx_id);
        match ctx_id.and_then(|ctx_id| self.scrolls.remove(&ctx_id)) {
            Some(_) => Ok(json!({"succeeded": true, "num_freed": 1})),
            None => Err((404, json!({"succeeded": true, "num_freed": 0}))),
        }
    }

    // -------------------------------------------------------------------------
    // Bulk
    // -------------------------------------------------------------------------

    fn bulk(&mut self, lines: &[Value]) -> Reply {
        let mut items = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let (action, meta) = match lines[i].as_object().and_then(|o| o.iter().next()) {
                Some((action, meta)) => (action.clone(), meta.clone()),
                None => return Err(error(400, "parse_exception", "malformed action line")),
            };
            let payload = if action == "delete" {
                i += 1;
                Value::Null
            } else {
                i += 2;
                lines.get(i - 1).cloned().unwrap_or(Value::Null)
            };
            let index = meta.get("_index").and_then(Value::as_str).unwrap_or_default().to_string();
            let id = match meta.get("_id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => {
                    self.next_auto_id += 1;
                    format!("auto-{}", self.next_auto_id)
                }
            };
            items.push(self.bulk_item(&action, &index, &id, payload));
        }

        self.bulk_batches.push(items.len());
        let errors = items.iter().any(|item| {
            item.as_object()
                .and_then(|o| o.values().next())
                .and_then(|v| v.get("status"))
                .and_then(Value::as_u64)
                .map(|status| status >= 400)
                .unwrap_or(false)
        });
        Ok(json!({"took": 1, "errors": errors, "items": items}))
    }

    fn bulk_item(&mut self, action: &str, index: &str, id: &str, payload: Value) -> Value {
        let outcome = if self.failing_ids.contains(id) {
            Err(error(409, "version_conflict_engine_exception", "injected conflict"))
        } else {
            match action {
                "index" => Ok(self.put(index, id, payload)),
                "create" if self.stored(index, id).is_some() => {
                    Err(error(409, "version_conflict_engine_exception", "document already exists"))
                }
                "create" => Ok(self.put(index, id, payload)),
                "update" => self.update(index, id, &payload),
                "delete" => self.delete(index, id),
                _ => Err(error(400, "illegal_argument_exception", "unknown action")),
            }
        };

        let mut item = match outcome {
            Ok(written) => {
                let status = if written["result"] == "created" { 201 } else { 200 };
                let mut item = written;
                item["status"] = json!(status);
                item
            }
            Err((status, body)) => match body.get("error") {
                Some(err) => json!({"_index": index, "_id": id, "status": status, "error": err}),
                None => {
                    let mut item = body;
                    item["status"] = json!(status);
                    item
                }
            },
        };
        if let Value::Object(fields) = &mut item {
            fields.remove("_shards");
        }
        let mut wrapper = Map::new();
        wrapper.insert(action.to_string(), item);
        Value::Object(wrapper)
    }
}

fn written(index: &str, id: &str, version: u64, result: &str) -> Value {
    json!({
        "_index": index, "_id": id, "_version": version, "result": result,
        "_shards": {"total": 1, "successful": 1, "failed": 0}
    })
}

fn search_response(total: usize, hits: Vec<Value>, scroll_id: Option<&str>) -> Value {
    let mut body = json!({
        "took": 1,
        "timed_out": false,
        "_shards": {"total": 1, "successful": 1, "skipped": 0, "failed": 0},
        "hits": {"total": {"value": total, "relation": "eq"}, "max_score": null, "hits": hits}
    });
    if let Some(scroll_id) = scroll_id {
        body["_scroll_id"] = json!(scroll_id);
    }
    body
}

fn next_page(ctx_id: u64, ctx: &mut ScrollContext) -> Value {
    let end = (ctx.offset + ctx.size).min(ctx.rows.len());
    let hits: Vec<Value> = ctx.rows[ctx.offset..end]
        .iter()
        .map(|(index, id, source)| json!({"_index": index, "_id": id, "_score": 1.0, "_source": source}))
        .collect();
    ctx.offset = end;
    ctx.pages += 1;
    ctx.token = format!("ctx{}-page{}", ctx_id, ctx.pages);
    search_response(ctx.rows.len(), hits, Some(ctx.token.as_str()))
}

// =============================================================================
// Query evaluation
// =============================================================================

fn field_value(source: &Value, id: &str, field: &str) -> Value {
    if field == "_id" {
        return Value::String(id.to_string());
    }
    field
        .split('.')
        .try_fold(source, |value, part| value.get(part))
        .cloned()
        .unwrap_or(Value::Null)
}

fn single_entry(value: &Value) -> Option<(&String, &Value)> {
    value.as_object().and_then(|o| o.iter().next())
}

fn matches(query: Option<&Value>, id: &str, source: &Value) -> bool {
    let (kind, body) = match query.and_then(single_entry) {
        Some(entry) => entry,
        None => return true,
    };

    match kind.as_str() {
        "match_all" => true,
        "bool" => {
            let clauses = |name: &str| -> Vec<Value> {
                body.get(name).and_then(Value::as_array).cloned().unwrap_or_default()
            };
            let (must, filter, should, must_not) =
                (clauses("must"), clauses("filter"), clauses("should"), clauses("must_not"));

            let required = must.iter().chain(filter.iter()).all(|q| matches(Some(q), id, source));
            let excluded = must_not.iter().any(|q| matches(Some(q), id, source));
            let should_hits = should.iter().filter(|q| matches(Some(q), id, source)).count();
            let minimum = match body.get("minimum_should_match").and_then(Value::as_u64) {
                Some(n) => n as usize,
                None if !should.is_empty() && must.is_empty() && filter.is_empty() => 1,
                None => 0,
            };
            required && !excluded && should_hits >= minimum
        }
        "term" => single_entry(body)
            .map(|(field, expected)| {
                let expected = expected.get("value").unwrap_or(expected);
                field_value(source, id, field) == *expected
            })
            .unwrap_or(false),
        "terms" => single_entry(body)
            .and_then(|(field, values)| {
                let actual = field_value(source, id, field);
                values.as_array().map(|values| values.contains(&actual))
            })
            .unwrap_or(false),
        "match" => single_entry(body)
            .map(|(field, text)| {
                let needle = text.as_str().map(str::to_lowercase).unwrap_or_else(|| text.to_string());
                match field_value(source, id, field) {
                    Value::String(s) => s.to_lowercase().contains(&needle),
                    other => other == *text,
                }
            })
            .unwrap_or(false),
        "range" => single_entry(body)
            .map(|(field, bounds)| {
                let actual = field_value(source, id, field);
                let check = |bound: &str, accept: fn(Ordering) -> bool| match bounds.get(bound) {
                    Some(limit) => accept(compare_values(Some(&actual), Some(limit))),
                    None => true,
                };
                !actual.is_null()
                    && check("gte", |o| o != Ordering::Less)
                    && check("gt", |o| o == Ordering::Greater)
                    && check("lte", |o| o != Ordering::Greater)
                    && check("lt", |o| o == Ordering::Less)
            })
            .unwrap_or(false),
        "exists" => body
            .get("field")
            .and_then(Value::as_str)
            .map(|field| !field_value(source, id, field).is_null())
            .unwrap_or(false),
        "ids" => body
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().any(|v| v.as_str() == Some(id)))
            .unwrap_or(false),
        _ => false,
    }
}

// =============================================================================
// Sorting
// =============================================================================

/// `(field, descending)` pairs; defaults to `_id` ascending
fn parse_sort(sort: Option<&Value>) -> Vec<(String, bool)> {
    let specs: Vec<(String, bool)> = sort
        .and_then(Value::as_array)
        .map(|specs| {
            specs
                .iter()
                .filter_map(single_entry)
                .map(|(field, order)| {
                    let order = order.get("order").unwrap_or(order);
                    (field.clone(), order.as_str() == Some("desc"))
                })
                .collect()
        })
        .unwrap_or_default();
    if specs.is_empty() {
        vec![("_id".to_string(), false)]
    } else {
        specs
    }
}

fn sort_key(sort: &[(String, bool)], id: &str, source: &Value) -> Vec<Value> {
    sort.iter().map(|(field, _)| field_value(source, id, field)).collect()
}

fn compare_keys(sort: &[(String, bool)], a: &[Value], b: &[Value]) -> Ordering {
    for (i, (_, descending)) in sort.iter().enumerate() {
        let ordering = compare_values(a.get(i), b.get(i));
        let ordering = if *descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Null < bool < number < string, then by value
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = |v: &Value| -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    };

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
