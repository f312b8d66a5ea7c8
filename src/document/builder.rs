//! Single-document operations

use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::object::object_fields;
use super::response::{DocumentResponse, GetResponse};
use crate::client::Client;
use crate::errors::{SearchError, SearchResult};
use crate::observability::Logger;
use crate::transport::{Method, Transport};

/// `refresh` query parameter of write operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    True,
    False,
    WaitFor,
}

impl Refresh {
    pub fn as_str(&self) -> &'static str {
        match self {
            Refresh::True => "true",
            Refresh::False => "false",
            Refresh::WaitFor => "wait_for",
        }
    }
}

impl fmt::Display for Refresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index, create, update, get, delete and existence check of one document
pub struct DocumentBuilder<'a, T: Transport> {
    client: &'a Client<T>,
    index: String,
    id: Option<String>,
    doc: Map<String, Value>,
    script: Option<Value>,
    refresh: Option<Refresh>,
    logger: Logger,
}

impl<'a, T: Transport> DocumentBuilder<'a, T> {
    pub fn new(client: &'a Client<T>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            id: None,
            doc: Map::new(),
            script: None,
            refresh: None,
            logger: client.logger().clone(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into()).filter(|id: &String| !id.is_empty());
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.doc.insert(field.into(), value.into());
        self
    }

    pub fn set_map(mut self, fields: Map<String, Value>) -> Self {
        self.doc.extend(fields);
        self
    }

    /// Merge the fields of any value serializing to a JSON object
    pub fn set_from<S: Serialize + ?Sized>(mut self, data: &S) -> SearchResult<Self> {
        self.doc.extend(object_fields(data)?);
        Ok(self)
    }

    pub fn refresh(mut self, refresh: Refresh) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Painless script used by `update` instead of the partial document
    pub fn script(mut self, source: impl Into<String>, params: Map<String, Value>) -> Self {
        let mut script = Map::new();
        script.insert("source".into(), Value::String(source.into()));
        script.insert("lang".into(), json!("painless"));
        if !params.is_empty() {
            script.insert("params".into(), Value::Object(params));
        }
        self.script = Some(Value::Object(script));
        self
    }

    pub fn doc(&self) -> &Map<String, Value> {
        &self.doc
    }

    /// `PUT /{index}/_doc/{id}`, or `POST /{index}/_doc` to let the engine pick the id
    pub fn index(&self) -> SearchResult<DocumentResponse> {
        let body = Value::Object(self.doc.clone());
        match &self.id {
            Some(id) => self.write(Method::Put, &self.path("_doc", id), &body),
            None => {
                let path = self.with_refresh(format!("/{}/_doc", self.index));
                self.write(Method::Post, &path, &body)
            }
        }
    }

    /// `PUT /{index}/_create/{id}`; fails remotely when the document exists
    pub fn create(&self) -> SearchResult<DocumentResponse> {
        let id = self.require_id()?;
        self.write(Method::Put, &self.path("_create", id), &Value::Object(self.doc.clone()))
    }

    /// `POST /{index}/_update/{id}` with the script if set, otherwise the partial document
    pub fn update(&self) -> SearchResult<DocumentResponse> {
        let id = self.require_id()?;
        let body = match &self.script {
            Some(script) => json!({"script": script}),
            None => json!({"doc": Value::Object(self.doc.clone())}),
        };
        self.write(Method::Post, &self.path("_update", id), &body)
    }

    /// Partial update that creates the document when missing
    pub fn upsert(&self) -> SearchResult<DocumentResponse> {
        let id = self.require_id()?;
        let body = json!({"doc": Value::Object(self.doc.clone()), "doc_as_upsert": true});
        self.write(Method::Post, &self.path("_update", id), &body)
    }

    /// `GET /{index}/_doc/{id}`; a missing document comes back with `found == false`
    pub fn get(&self) -> SearchResult<GetResponse> {
        let id = self.require_id()?;
        let path = format!("/{}/_doc/{}", self.index, id);
        match self.client.perform_json_with(&self.logger, Method::Get, &path, None) {
            Ok(bytes) => self.client.decode(&bytes),
            Err(err) => {
                let missing = err
                    .as_remote()
                    .filter(|remote| remote.is_not_found())
                    .and_then(|remote| remote.body_json())
                    .filter(|body| body.get("found") == Some(&Value::Bool(false)));
                match missing {
                    Some(body) => Ok(serde_json::from_value(body)?),
                    None => Err(err),
                }
            }
        }
    }

    pub fn delete(&self) -> SearchResult<DocumentResponse> {
        let id = self.require_id()?;
        let bytes = self
            .client
            .perform_json_with(&self.logger, Method::Delete, &self.path("_doc", id), None)?;
        self.client.decode(&bytes)
    }

    /// `HEAD /{index}/_doc/{id}`; 404 is `false`, other failures propagate
    pub fn exists(&self) -> SearchResult<bool> {
        let id = self.require_id()?;
        let path = format!("/{}/_doc/{}", self.index, id);
        match self.client.perform_json_with(&self.logger, Method::Head, &path, None) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn require_id(&self) -> SearchResult<&str> {
        self.id.as_deref().ok_or_else(|| SearchError::missing_field("id"))
    }

    fn path(&self, endpoint: &str, id: &str) -> String {
        self.with_refresh(format!("/{}/{}/{}", self.index, endpoint, id))
    }

    fn with_refresh(&self, path: String) -> String {
        match self.refresh {
            Some(refresh) => format!("{}?refresh={}", path, refresh),
            None => path,
        }
    }

    fn write(&self, method: Method, path: &str, body: &Value) -> SearchResult<DocumentResponse> {
        let bytes = self.client.perform_json_with(&self.logger, method, path, Some(body))?;
        self.client.decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn written(result: &str) -> Value {
        json!({"_index": "users", "_id": "1", "_version": 1, "result": result,
               "_shards": {"total": 2, "successful": 1, "failed": 0}})
    }

    #[test]
    fn test_index_with_and_without_id() {
        let transport = MockTransport::new();
        transport.push_json(written("created"));
        transport.push_json(written("created"));
        let client = Client::new(transport);

        let resp = client.document("users").id("1").set("name", "ada").index().unwrap();
        assert!(resp.is_created());
        client.document("users").set("name", "bob").refresh(Refresh::WaitFor).index().unwrap();

        let requests = client.transport().requests();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].path, "/users/_doc/1");
        assert_eq!(requests[0].json_body().unwrap(), json!({"name": "ada"}));
        assert_eq!(requests[1].method, Method::Post);
        assert_eq!(requests[1].path, "/users/_doc?refresh=wait_for");
    }

    #[test]
    fn test_operations_requiring_id() {
        let client = Client::new(MockTransport::new());
        let doc = client.document("users");
        for err in [
            doc.create().unwrap_err(),
            doc.update().unwrap_err(),
            doc.upsert().unwrap_err(),
            doc.delete().unwrap_err(),
        ] {
            assert_eq!(err.to_string(), "Missing required field: id");
        }
        assert!(doc.get().is_err());
        assert!(doc.exists().is_err());
        assert_eq!(client.transport().request_count(), 0);
    }

    #[test]
    fn test_update_prefers_script() {
        let transport = MockTransport::new();
        transport.push_json(written("updated"));
        transport.push_json(written("updated"));
        let client = Client::new(transport);

        client.document("users").id("1").set("age", 37).update().unwrap();
        let mut params = Map::new();
        params.insert("n".into(), json!(1));
        client
            .document("users")
            .id("1")
            .set("ignored", true)
            .script("ctx._source.visits += params.n", params)
            .refresh(Refresh::True)
            .update()
            .unwrap();

        let requests = client.transport().requests();
        assert_eq!(requests[0].path, "/users/_update/1");
        assert_eq!(requests[0].json_body().unwrap(), json!({"doc": {"age": 37}}));
        assert_eq!(requests[1].path, "/users/_update/1?refresh=true");
        assert_eq!(
            requests[1].json_body().unwrap(),
            json!({"script": {"source": "ctx._source.visits += params.n", "lang": "painless", "params": {"n": 1}}})
        );
    }

    #[test]
    fn test_upsert_and_create_bodies() {
        let transport = MockTransport::new();
        transport.push_json(written("created"));
        transport.push_json(written("created"));
        let client = Client::new(transport);

        client.document("users").id("1").set("a", 1).upsert().unwrap();
        client.document("users").id("2").set("a", 2).create().unwrap();

        let requests = client.transport().requests();
        assert_eq!(requests[0].json_body().unwrap(), json!({"doc": {"a": 1}, "doc_as_upsert": true}));
        assert_eq!(requests[1].method, Method::Put);
        assert_eq!(requests[1].path, "/users/_create/2");
    }

    #[test]
    fn test_get_missing_document_is_data() {
        let transport = MockTransport::new();
        transport.push_json(json!({"_index": "users", "_id": "1", "_version": 3, "found": true, "_source": {"n": 1}}));
        transport.push_error(404, json!({"_index": "users", "_id": "2", "found": false}));
        transport.push_error(404, json!({"error": {"type": "index_not_found_exception", "reason": "no such index"}}));
        let client = Client::new(transport);

        let found = client.document("users").id("1").get().unwrap();
        assert!(found.found);
        assert_eq!(found.source_as::<Value>().unwrap(), json!({"n": 1}));

        let missing = client.document("users").id("2").get().unwrap();
        assert!(!missing.found);
        assert_eq!(missing.id, "2");

        let err = client.document("nope").id("1").get().unwrap_err();
        assert_eq!(err.as_remote().unwrap().error_type.as_deref(), Some("index_not_found_exception"));
    }

    #[test]
    fn test_exists_maps_not_found_to_false() {
        let transport = MockTransport::new();
        transport.push_json(json!({}));
        transport.push_error(404, json!({}));
        transport.push_error(500, json!({"error": {"type": "exception", "reason": "boom"}}));
        let client = Client::new(transport);

        assert!(client.document("users").id("1").exists().unwrap());
        assert!(!client.document("users").id("2").exists().unwrap());
        assert!(client.document("users").id("3").exists().is_err());
        assert_eq!(client.transport().requests()[0].method, Method::Head);
    }

    #[test]
    fn test_delete() {
        let transport = MockTransport::new();
        transport.push_json(written("deleted"));
        let client = Client::new(transport);

        let resp = client.document("users").id("1").refresh(Refresh::False).delete().unwrap();
        assert_eq!(resp.result, "deleted");
        let req = client.transport().last_request().unwrap();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.path, "/users/_doc/1?refresh=false");
    }
}
