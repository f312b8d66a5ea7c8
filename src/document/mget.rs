//! Multi-get by id

use serde_json::{json, Value};

use super::response::MGetResponse;
use crate::client::{index_path, Client};
use crate::errors::{SearchError, SearchResult};
use crate::observability::Logger;
use crate::transport::{Method, Transport};

/// `POST /{index}/_mget` with `{"ids": [...]}`
pub struct MGetBuilder<'a, T: Transport> {
    client: &'a Client<T>,
    index: String,
    ids: Vec<String>,
    logger: Logger,
}

impl<'a, T: Transport> MGetBuilder<'a, T> {
    pub fn new(client: &'a Client<T>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            ids: Vec::new(),
            logger: client.logger().clone(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Append ids; repeated calls accumulate
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn build(&self) -> Value {
        json!({"ids": self.ids})
    }

    /// Fails with `MissingField("ids")` when no id was given
    pub fn execute(&self) -> SearchResult<MGetResponse> {
        if self.ids.is_empty() {
            return Err(SearchError::missing_field("ids"));
        }
        let bytes = self.client.perform_json_with(
            &self.logger,
            Method::Post,
            &index_path(&self.index, "_mget"),
            Some(&self.build()),
        )?;
        self.client.decode(&bytes)
    }
}
