//! `_bulk` responses and the per-batch report

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::operation::BulkAction;

/// Per-item error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub reason: String,
}

/// One item of the `items` array, under its action key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResponse {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_version", default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkItemError>,
}

impl BulkItemResponse {
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 400
    }
}

/// Raw `_bulk` response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BTreeMap<String, BulkItemResponse>>,
}

/// Outcome of one item
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemOutcome {
    pub action: Option<BulkAction>,
    pub index: String,
    pub id: Option<String>,
    pub status: u16,
    pub result: Option<String>,
    pub version: Option<u64>,
}

/// A failed item
#[derive(Debug, Clone, PartialEq)]
pub struct BulkFailure {
    pub index: String,
    pub id: Option<String>,
    pub status: u16,
    pub error_type: String,
    pub reason: String,
}

impl BulkFailure {
    /// `index/id` of the failed document
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => format!("{}/{}", self.index, id),
            None => self.index.clone(),
        }
    }
}

/// Typed report of one flushed batch
///
/// Partial failure is data: a batch where some items failed still decodes
/// into a report, and `has_errors` says so.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub took: u64,
    pub submitted: usize,
    pub items: Vec<BulkItemOutcome>,
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    pub(crate) fn from_response(submitted: usize, response: BulkResponse) -> Self {
        let mut report = BulkReport {
            took: response.took,
            submitted,
            items: Vec::with_capacity(response.items.len()),
            failures: Vec::new(),
        };

        for entry in response.items {
            for (action, item) in entry {
                if item.is_failure() {
                    let (error_type, reason) = item
                        .error
                        .clone()
                        .map(|e| (e.error_type, e.reason))
                        .unwrap_or_default();
                    report.failures.push(BulkFailure {
                        index: item.index.clone(),
                        id: item.id.clone(),
                        status: item.status,
                        error_type,
                        reason,
                    });
                }
                report.items.push(BulkItemOutcome {
                    action: BulkAction::parse(&action),
                    index: item.index,
                    id: item.id,
                    status: item.status,
                    result: item.result,
                    version: item.version,
                });
            }
        }
        report
    }

    /// True iff any item failed, regardless of the envelope's `errors` flag
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.items.len() - self.failures.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Merge another report into this one
    pub fn absorb(&mut self, other: BulkReport) {
        self.took += other.took;
        self.submitted += other.submitted;
        self.items.extend(other.items);
        self.failures.extend(other.failures);
    }

    /// Summary as JSON, for logging
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "took": self.took,
            "submitted": self.submitted,
            "succeeded": self.success_count(),
            "failed": self.failure_count(),
        })
    }
}
