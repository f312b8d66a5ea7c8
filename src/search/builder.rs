//! Search and aggregation builders
//!
//! Both are consuming builders scoped to one request. They borrow the client
//! and carry their own logger, so tracing one request never touches another.

use serde_json::{Map, Value};

use super::request::SearchRequest;
use super::response::{AggregationResponse, CountResponse, SearchResponse};
use crate::aggregation::{AggClauses, AggTree};
use crate::client::{index_path, Client};
use crate::errors::SearchResult;
use crate::observability::Logger;
use crate::query::{BoolClauses, BoolQuery, SortOrder, SortSpec};
use crate::transport::{Method, Transport};

/// `_search` and `_count` against one index pattern
pub struct SearchBuilder<'a, T: Transport> {
    client: &'a Client<T>,
    index: String,
    request: SearchRequest,
    logger: Logger,
}

impl<'a, T: Transport> SearchBuilder<'a, T> {
    /// `from` 0 and `size` from the client's `search_page_size`
    pub fn new(client: &'a Client<T>, index: impl Into<String>) -> Self {
        let request = SearchRequest {
            from: Some(0),
            size: Some(client.config().search_page_size),
            ..SearchRequest::default()
        };
        Self {
            client,
            index: index.into(),
            request,
            logger: client.logger().clone(),
        }
    }

    /// Log this builder's requests through `logger`
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the whole bool query
    pub fn query(mut self, query: BoolQuery) -> Self {
        self.request.query = query;
        self
    }

    /// Send `match_all` when no other clause is present
    pub fn match_all(mut self) -> Self {
        self.request.match_all = true;
        self
    }

    pub fn from(mut self, from: usize) -> Self {
        self.request.from = Some(from);
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.request.size = Some(size);
        self
    }

    pub fn sort(self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by(SortSpec::new(field, order))
    }

    pub fn sort_by(mut self, spec: SortSpec) -> Self {
        self.request.sort.push(spec);
        self
    }

    /// Restrict `_source` to these fields
    pub fn source<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.source = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn highlight<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.highlight = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_score(mut self, score: f64) -> Self {
        self.request.min_score = Some(score);
        self
    }

    /// Single-field aggregation of any type
    pub fn aggregation(mut self, name: impl Into<String>, agg_type: impl Into<String>, field: impl Into<String>) -> Self {
        self.request.aggs.add_metric(name, agg_type, field, Map::new());
        self
    }

    /// Replace the aggregation tree
    pub fn aggs(mut self, tree: AggTree) -> Self {
        self.request.aggs = tree;
        self
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Render the request body
    pub fn build(&self) -> Value {
        self.request.render()
    }

    /// `POST /{index}/_search`
    pub fn execute(&self) -> SearchResult<SearchResponse> {
        let body = self.build();
        let bytes = self.client.perform_json_with(
            &self.logger,
            Method::Post,
            &index_path(&self.index, "_search"),
            Some(&body),
        )?;
        self.client.decode(&bytes)
    }

    /// `POST /{index}/_count` with the query only
    pub fn count(&self) -> SearchResult<u64> {
        let mut body = Map::new();
        if let Some(query) = self.request.query_value() {
            body.insert("query".into(), query);
        }
        let bytes = self.client.perform_json_with(
            &self.logger,
            Method::Post,
            &index_path(&self.index, "_count"),
            Some(&Value::Object(body)),
        )?;
        let response: CountResponse = self.client.decode(&bytes)?;
        Ok(response.count)
    }
}

impl<T: Transport> BoolClauses for SearchBuilder<'_, T> {
    fn bool_query_mut(&mut self) -> &mut BoolQuery {
        &mut self.request.query
    }
}

/// Aggregation-only search (`size` 0 unless changed)
pub struct AggregationBuilder<'a, T: Transport> {
    client: &'a Client<T>,
    index: String,
    query: BoolQuery,
    aggs: AggTree,
    size: usize,
    logger: Logger,
}

impl<'a, T: Transport> AggregationBuilder<'a, T> {
    pub fn new(client: &'a Client<T>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            query: BoolQuery::new(),
            aggs: AggTree::new(),
            size: 0,
            logger: client.logger().clone(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Restrict the documents being aggregated
    pub fn query(mut self, query: BoolQuery) -> Self {
        self.query = query;
        self
    }

    /// Also return this many hits
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn tree(&self) -> &AggTree {
        &self.aggs
    }

    /// `{"size": n, "aggs": {...}, "query"?: {...}}`
    pub fn build(&self) -> Value {
        let mut body = Map::new();
        body.insert("size".into(), Value::from(self.size));
        body.insert("aggs".into(), self.aggs.render());
        if let Some(query) = self.query.to_query() {
            body.insert("query".into(), query);
        }
        Value::Object(body)
    }

    /// `POST /{index}/_search`
    pub fn execute(&self) -> SearchResult<AggregationResponse> {
        let body = self.build();
        let bytes = self.client.perform_json_with(
            &self.logger,
            Method::Post,
            &index_path(&self.index, "_search"),
            Some(&body),
        )?;
        self.client.decode(&bytes)
    }
}

impl<T: Transport> AggClauses for AggregationBuilder<'_, T> {
    fn agg_tree_mut(&mut self) -> &mut AggTree {
        &mut self.aggs
    }
}
