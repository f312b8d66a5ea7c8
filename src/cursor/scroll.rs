//! Stateful cursor over a server-side snapshot
//!
//! State machine:
//!
//! ```text
//! Uninitialized --open--> Active --next--> Active --close--> Closed
//! ```
//!
//! - `open` fetches the first page and stores the token the engine issued
//! - every `next` replaces the token; the previous one must not be reused
//! - an empty page does not close the cursor, the caller still releases
//! - `close` is idempotent and never fails destructively
//! - a token that expired server-side surfaces as a remote error on `next`
//!   and leaves the cursor `Active`

use std::fmt;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::page::Page;
use crate::client::{index_path, Client};
use crate::config::KeepAlive;
use crate::errors::{SearchError, SearchResult};
use crate::observability::{Event, Logger};
use crate::query::{BoolClauses, BoolQuery};
use crate::search::SearchResponse;
use crate::transport::{Method, Transport};

const SCROLL_PATH: &str = "/_search/scroll";

/// Stateful cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    Uninitialized,
    Active,
    Closed,
}

impl ScrollState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollState::Uninitialized => "uninitialized",
            ScrollState::Active => "active",
            ScrollState::Closed => "closed",
        }
    }
}

impl fmt::Display for ScrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One server-side snapshot, paged forward until released
pub struct ScrollCursor<'a, T: Transport> {
    client: &'a Client<T>,
    index: String,
    query: BoolQuery,
    page_size: usize,
    keep_alive: KeepAlive,
    state: ScrollState,
    token: Option<String>,
    session_id: Uuid,
    pages_fetched: u64,
    logger: Logger,
}

impl<'a, T: Transport> ScrollCursor<'a, T> {
    /// Cursor using the client's `scroll_page_size` and `scroll_keep_alive`
    pub fn new(client: &'a Client<T>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            query: BoolQuery::new(),
            page_size: client.config().scroll_page_size,
            keep_alive: client.config().scroll_keep_alive,
            state: ScrollState::Uninitialized,
            token: None,
            session_id: Uuid::new_v4(),
            pages_fetched: 0,
            logger: client.logger().clone(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn keep_alive(mut self, keep_alive: KeepAlive) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    /// Current token; `None` until the first page has been fetched
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Body of the opening request
    pub fn build(&self) -> Value {
        let mut body = Map::new();
        if let Some(query) = self.query.to_query() {
            body.insert("query".into(), query);
        }
        body.insert("size".into(), Value::from(self.page_size));
        Value::Object(body)
    }

    /// Open the snapshot with explicit query, page size and keep-alive
    ///
    /// Refused without touching the cursor unless it is `Uninitialized`.
    pub fn open(&mut self, query: &BoolQuery, page_size: usize, keep_alive: KeepAlive) -> SearchResult<Page> {
        if self.state != ScrollState::Uninitialized {
            return Err(SearchError::invalid_state("open", self.state.as_str()));
        }
        self.query = query.clone();
        self.page_size = page_size;
        self.keep_alive = keep_alive;
        self.start()
    }

    /// Open the snapshot with the query and settings accumulated on the builder
    pub fn start(&mut self) -> SearchResult<Page> {
        if self.state != ScrollState::Uninitialized {
            return Err(SearchError::invalid_state("open", self.state.as_str()));
        }

        let path = format!(
            "{}?scroll={}",
            index_path(&self.index, "_search"),
            self.keep_alive.as_param()
        );
        let response = self.fetch(Method::Post, &path, &self.build())?;
        let token = Self::require_token(&response)?;

        self.token = Some(token);
        self.state = ScrollState::Active;
        self.pages_fetched = 1;
        self.client.metrics().increment_scrolls_opened();

        let page = Page::from_response(response);
        self.log_page(Event::ScrollOpened, &page);
        Ok(page)
    }

    /// Fetch the next page and replace the token
    pub fn next(&mut self) -> SearchResult<Page> {
        let token = match (self.state, &self.token) {
            (ScrollState::Active, Some(token)) => token.clone(),
            (state, _) => return Err(SearchError::invalid_state("next", state.as_str())),
        };

        let body = json!({"scroll": self.keep_alive.as_param(), "scroll_id": token});
        let response = self.fetch(Method::Post, SCROLL_PATH, &body)?;
        let token = Self::require_token(&response)?;

        self.token = Some(token);
        self.pages_fetched += 1;

        let page = Page::from_response(response);
        self.log_page(Event::ScrollAdvanced, &page);
        Ok(page)
    }

    /// Release the snapshot
    ///
    /// No-op unless `Active`. A 404 from the engine means the context has
    /// already expired and counts as released. On any other failure the
    /// cursor is still `Closed` (the engine expires the context after the
    /// keep-alive) and the error is returned.
    pub fn close(&mut self) -> SearchResult<()> {
        if self.state != ScrollState::Active {
            return Ok(());
        }
        self.state = ScrollState::Closed;
        let token = match self.token.take() {
            Some(token) => token,
            None => return Ok(()),
        };

        let session = self.session_id.to_string();
        let body = json!({"scroll_id": token});
        match self
            .client
            .perform_json_with(&self.logger, Method::Delete, SCROLL_PATH, Some(&body))
        {
            Ok(_) => {
                self.client.metrics().increment_scrolls_released();
                self.logger.info(Event::ScrollReleased, &[("session_id", session.as_str())]);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                self.client.metrics().increment_scrolls_released();
                self.logger.info(
                    Event::ScrollReleased,
                    &[("session_id", session.as_str()), ("expired", "true")],
                );
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.logger.warn(
                    Event::ScrollReleaseFailed,
                    &[("session_id", session.as_str()), ("error", message.as_str())],
                );
                Err(err)
            }
        }
    }

    fn fetch(&self, method: Method, path: &str, body: &Value) -> SearchResult<SearchResponse> {
        let bytes = self.client.perform_json_with(&self.logger, method, path, Some(body))?;
        self.client.decode(&bytes)
    }

    fn require_token(response: &SearchResponse) -> SearchResult<String> {
        match response.scroll_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(SearchError::malformed("scroll response carries no _scroll_id")),
        }
    }

    fn log_page(&self, event: Event, page: &Page) {
        let session = self.session_id.to_string();
        let rows = page.len().to_string();
        let pages = self.pages_fetched.to_string();
        self.logger.info(
            event,
            &[
                ("session_id", session.as_str()),
                ("rows", rows.as_str()),
                ("pages", pages.as_str()),
            ],
        );
    }
}

impl<T: Transport> BoolClauses for ScrollCursor<'_, T> {
    fn bool_query_mut(&mut self) -> &mut BoolQuery {
        &mut self.query
    }
}

impl<T: Transport> Drop for ScrollCursor<'_, T> {
    fn drop(&mut self) {
        if self.state == ScrollState::Active {
            let _ = self.close();
        }
    }
}
