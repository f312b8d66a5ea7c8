//! Delete-by-query and update-by-query

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::client::{index_path, Client};
use crate::errors::{SearchError, SearchResult};
use crate::observability::Logger;
use crate::query::{BoolClauses, BoolQuery};
use crate::transport::{Method, Transport};

/// Retry counters of a by-query run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Retries {
    #[serde(default)]
    pub bulk: u64,
    #[serde(default)]
    pub search: u64,
}

/// Outcome of `_delete_by_query` / `_update_by_query`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ByQueryResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub deleted: u64,
    #[serde(default)]
    pub batches: u64,
    #[serde(default)]
    pub version_conflicts: u64,
    #[serde(default)]
    pub noops: u64,
    #[serde(default)]
    pub retries: Retries,
    #[serde(default)]
    pub failures: Vec<Value>,
}

impl ByQueryResponse {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// `POST /{index}/_delete_by_query`
///
/// An empty query is refused: it would delete every document.
pub struct DeleteByQueryBuilder<'a, T: Transport> {
    client: &'a Client<T>,
    index: String,
    query: BoolQuery,
    logger: Logger,
}

impl<'a, T: Transport> DeleteByQueryBuilder<'a, T> {
    pub fn new(client: &'a Client<T>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            query: BoolQuery::new(),
            logger: client.logger().clone(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(&self) -> Value {
        let mut body = Map::new();
        if let Some(query) = self.query.to_query() {
            body.insert("query".into(), query);
        }
        Value::Object(body)
    }

    pub fn execute(&self) -> SearchResult<ByQueryResponse> {
        if self.query.is_empty() {
            return Err(SearchError::missing_field("query"));
        }
        let bytes = self.client.perform_json_with(
            &self.logger,
            Method::Post,
            &index_path(&self.index, "_delete_by_query"),
            Some(&self.build()),
        )?;
        self.client.decode(&bytes)
    }
}

impl<T: Transport> BoolClauses for DeleteByQueryBuilder<'_, T> {
    fn bool_query_mut(&mut self) -> &mut BoolQuery {
        &mut self.query
    }
}

/// `POST /{index}/_update_by_query` with a painless script
pub struct UpdateByQueryBuilder<'a, T: Transport> {
    client: &'a Client<T>,
    index: String,
    query: BoolQuery,
    source: Option<String>,
    params: Map<String, Value>,
    logger: Logger,
}

impl<'a, T: Transport> UpdateByQueryBuilder<'a, T> {
    pub fn new(client: &'a Client<T>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            query: BoolQuery::new(),
            source: None,
            params: Map::new(),
            logger: client.logger().clone(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the script; `params` are merged into any existing ones
    pub fn script(mut self, source: impl Into<String>, params: Map<String, Value>) -> Self {
        self.source = Some(source.into());
        self.params.extend(params);
        self
    }

    /// Append `ctx._source.{field} = params.{field}` to the script
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let assignment = format!("ctx._source.{} = params.{}", field, field);
        self.source = Some(match self.source.take() {
            Some(existing) => format!("{}; {}", existing, assignment),
            None => assignment,
        });
        self.params.insert(field, value.into());
        self
    }

    fn script_value(&self) -> Option<Value> {
        let source = self.source.as_ref()?;
        let mut script = Map::new();
        script.insert("source".into(), Value::String(source.clone()));
        script.insert("lang".into(), json!("painless"));
        if !self.params.is_empty() {
            script.insert("params".into(), Value::Object(self.params.clone()));
        }
        Some(Value::Object(script))
    }

    pub fn build(&self) -> Value {
        let mut body = Map::new();
        if let Some(query) = self.query.to_query() {
            body.insert("query".into(), query);
        }
        if let Some(script) = self.script_value() {
            body.insert("script".into(), script);
        }
        Value::Object(body)
    }

    /// Fails with `MissingField("script")` when neither `script` nor `set` was called
    pub fn execute(&self) -> SearchResult<ByQueryResponse> {
        if self.source.is_none() {
            return Err(SearchError::missing_field("script"));
        }
        let bytes = self.client.perform_json_with(
            &self.logger,
            Method::Post,
            &index_path(&self.index, "_update_by_query"),
            Some(&self.build()),
        )?;
        self.client.decode(&bytes)
    }
}

impl<T: Transport> BoolClauses for UpdateByQueryBuilder<'_, T> {
    fn bool_query_mut(&mut self) -> &mut BoolQuery {
        &mut self.query
    }
}
