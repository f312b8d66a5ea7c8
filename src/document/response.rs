//! Single-document responses

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{SearchError, SearchResult};
use crate::search::ShardStats;

/// Result of index / create / update / delete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentResponse {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_version", default)]
    pub version: u64,
    /// `created`, `updated`, `deleted`, `noop` or `not_found`
    #[serde(default)]
    pub result: String,
    #[serde(rename = "_shards", default)]
    pub shards: ShardStats,
    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<u64>,
    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<u64>,
}

impl DocumentResponse {
    pub fn is_created(&self) -> bool {
        self.result == "created"
    }
}

/// Result of a get; `found` is false for a missing document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub found: bool,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

impl GetResponse {
    pub fn source_as<D: DeserializeOwned>(&self) -> SearchResult<D> {
        match &self.source {
            Some(source) => Ok(serde_json::from_value(source.clone())?),
            None => Err(SearchError::malformed(format!("document {} has no _source", self.id))),
        }
    }
}

/// Result of `_mget`, one entry per requested id in request order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MGetResponse {
    #[serde(default)]
    pub docs: Vec<GetResponse>,
}

impl MGetResponse {
    pub fn found(&self) -> impl Iterator<Item = &GetResponse> {
        self.docs.iter().filter(|doc| doc.found)
    }

    pub fn missing_ids(&self) -> Vec<&str> {
        self.docs
            .iter()
            .filter(|doc| !doc.found)
            .map(|doc| doc.id.as_str())
            .collect()
    }
}
