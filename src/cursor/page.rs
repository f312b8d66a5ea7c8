//! One page of cursor results

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::SearchResult;
use crate::search::{Hit, SearchResponse, TotalHits};

/// Rows returned by one cursor step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub hits: Vec<Hit>,
    pub total: Option<TotalHits>,
    pub took: u64,
}

impl Page {
    pub(crate) fn from_response(response: SearchResponse) -> Self {
        Self {
            hits: response.hits.hits,
            total: response.hits.total,
            took: response.took,
        }
    }

    /// True when the page carried at least one row
    ///
    /// An empty page is the end-of-data signal for both cursors.
    pub fn has_more(&self) -> bool {
        !self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Total matches of the underlying query (0 when not reported)
    pub fn total_hits(&self) -> u64 {
        self.total.as_ref().map(|t| t.value).unwrap_or(0)
    }

    /// Sort values of the last row
    pub fn last_sort_values(&self) -> Option<&[Value]> {
        self.hits.last().and_then(|hit| hit.sort.as_deref())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.id.as_str()).collect()
    }

    pub fn sources<D: DeserializeOwned>(&self) -> SearchResult<Vec<D>> {
        self.hits.iter().map(Hit::source_as).collect()
    }
}
