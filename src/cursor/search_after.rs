//! Stateless cursor keyed on the last row's sort values
//!
//! Nothing is held server-side. The position is the `sort` array of the
//! last row of the previous page, sent back as `search_after`. A sort
//! without a unique tiebreaker can skip or repeat rows at page boundaries,
//! so when no sort is given the cursor sorts on `_id` ascending.

use std::fmt;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::page::Page;
use crate::client::{index_path, Client};
use crate::errors::{SearchError, SearchResult};
use crate::observability::{Event, Logger};
use crate::query::{render_sort, BoolClauses, BoolQuery, SortOrder, SortSpec};
use crate::search::SearchResponse;
use crate::transport::{Method, Transport};

/// Query, sort and page size shared by every page of one traversal
#[derive(Debug, Clone, PartialEq)]
pub struct SortPageRequest {
    pub query: BoolQuery,
    pub sort: Vec<SortSpec>,
    pub page_size: usize,
    pub source: Vec<String>,
    pub highlight: Vec<String>,
    pub min_score: Option<f64>,
}

impl SortPageRequest {
    pub fn new(query: BoolQuery, sort: Vec<SortSpec>, page_size: usize) -> Self {
        Self {
            query,
            sort,
            page_size,
            source: Vec::new(),
            highlight: Vec::new(),
            min_score: None,
        }
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(SortSpec::new(field, order));
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn source<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn highlight<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.highlight = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Drop rows scoring below `score`
    pub fn min_score(mut self, score: f64) -> Self {
        self.min_score = Some(score);
        self
    }

    /// The sort actually sent: `_id` ascending when none was given
    pub fn effective_sort(&self) -> Vec<SortSpec> {
        if self.sort.is_empty() {
            vec![SortSpec::id_tiebreaker()]
        } else {
            self.sort.clone()
        }
    }

    /// `{"query"?, "min_score"?, "size", "sort", "search_after"?, "_source"?, "highlight"?}`
    pub fn render(&self, position: Option<&[Value]>) -> Value {
        let mut body = Map::new();
        if let Some(query) = self.query.to_query() {
            body.insert("query".into(), query);
        }
        if let Some(min_score) = self.min_score {
            body.insert("min_score".into(), Value::from(min_score));
        }
        body.insert("size".into(), Value::from(self.page_size));
        body.insert("sort".into(), render_sort(&self.effective_sort()));
        if let Some(position) = position {
            body.insert("search_after".into(), Value::Array(position.to_vec()));
        }
        if !self.source.is_empty() {
            body.insert(
                "_source".into(),
                Value::Array(self.source.iter().cloned().map(Value::String).collect()),
            );
        }
        if !self.highlight.is_empty() {
            let fields: Map<String, Value> = self
                .highlight
                .iter()
                .map(|field| (field.clone(), Value::Object(Map::new())))
                .collect();
            let mut highlight = Map::new();
            highlight.insert("fields".into(), Value::Object(fields));
            body.insert("highlight".into(), Value::Object(highlight));
        }
        Value::Object(body)
    }
}

impl BoolClauses for SortPageRequest {
    fn bool_query_mut(&mut self) -> &mut BoolQuery {
        &mut self.query
    }
}

/// Sort cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCursorState {
    Uninitialized,
    Positioned,
    Exhausted,
}

impl SortCursorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortCursorState::Uninitialized => "uninitialized",
            SortCursorState::Positioned => "positioned",
            SortCursorState::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for SortCursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Forward-only pager over a sorted result set
pub struct SortCursor<'a, T: Transport> {
    client: &'a Client<T>,
    index: String,
    request: SortPageRequest,
    position: Option<Vec<Value>>,
    state: SortCursorState,
    session_id: Uuid,
    pages_fetched: u64,
    rows_fetched: u64,
    logger: Logger,
}

impl<'a, T: Transport> SortCursor<'a, T> {
    /// Cursor paging by the client's `search_page_size`
    pub fn new(client: &'a Client<T>, index: impl Into<String>) -> Self {
        let page_size = client.config().search_page_size;
        Self {
            client,
            index: index.into(),
            request: SortPageRequest::new(BoolQuery::new(), Vec::new(), page_size),
            position: None,
            state: SortCursorState::Uninitialized,
            session_id: Uuid::new_v4(),
            pages_fetched: 0,
            rows_fetched: 0,
            logger: client.logger().clone(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> SortCursorState {
        self.state
    }

    /// Sort values of the last row seen
    pub fn position(&self) -> Option<&[Value]> {
        self.position.as_deref()
    }

    pub fn request(&self) -> &SortPageRequest {
        &self.request
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    pub fn rows_fetched(&self) -> u64 {
        self.rows_fetched
    }

    /// Fetch the first page, restarting the traversal
    ///
    /// The cursor is reset only once the page has arrived; a failed restart
    /// leaves the previous traversal in place.
    pub fn first(&mut self, request: SortPageRequest) -> SearchResult<Page> {
        let (page, position) = self.fetch(&request, None)?;
        self.request = request;
        self.position = None;
        self.pages_fetched = 0;
        self.rows_fetched = 0;
        Ok(self.advance(page, position))
    }

    /// Fetch the page after the recorded position
    pub fn next(&mut self) -> SearchResult<Page> {
        match self.state {
            SortCursorState::Positioned => {
                let (page, position) = self.fetch(&self.request, self.position.as_deref())?;
                Ok(self.advance(page, position))
            }
            SortCursorState::Exhausted => Err(SearchError::NoMoreData),
            SortCursorState::Uninitialized => Err(SearchError::invalid_state("next", self.state.as_str())),
        }
    }

    /// Continue a traversal from a saved position without any request
    pub fn resume_from(&mut self, request: SortPageRequest, position: Vec<Value>) -> SearchResult<()> {
        if position.is_empty() {
            return Err(SearchError::missing_field("position"));
        }
        self.request = request;
        self.position = Some(position);
        self.state = SortCursorState::Positioned;
        Ok(())
    }

    /// One round trip; returns the page and the position it ends on, `None`
    /// when the page is empty. Nothing on the cursor changes.
    fn fetch(&self, request: &SortPageRequest, position: Option<&[Value]>) -> SearchResult<(Page, Option<Vec<Value>>)> {
        let body = request.render(position);
        let bytes = self.client.perform_json_with(
            &self.logger,
            Method::Post,
            &index_path(&self.index, "_search"),
            Some(&body),
        )?;
        let response: SearchResponse = self.client.decode(&bytes)?;
        let page = Page::from_response(response);
        if page.is_empty() {
            return Ok((page, None));
        }

        let position = match page.last_sort_values() {
            Some(values) if !values.is_empty() => values.to_vec(),
            _ => return Err(SearchError::malformed("last hit carries no sort values")),
        };
        Ok((page, Some(position)))
    }

    fn advance(&mut self, page: Page, position: Option<Vec<Value>>) -> Page {
        self.pages_fetched += 1;
        match position {
            Some(position) => {
                self.position = Some(position);
                self.state = SortCursorState::Positioned;
                self.rows_fetched += page.len() as u64;
                self.log(Event::SortCursorAdvanced, &page);
            }
            None => {
                self.state = SortCursorState::Exhausted;
                self.log(Event::SortCursorExhausted, &page);
            }
        }
        page
    }

    fn log(&self, event: Event, page: &Page) {
        let session = self.session_id.to_string();
        let rows = page.len().to_string();
        let total = self.rows_fetched.to_string();
        let position = self
            .position
            .as_ref()
            .map(|p| Value::Array(p.clone()).to_string())
            .unwrap_or_default();
        self.logger.info(
            event,
            &[
                ("session_id", session.as_str()),
                ("rows", rows.as_str()),
                ("rows_total", total.as_str()),
                ("position", position.as_str()),
            ],
        );
    }
}
