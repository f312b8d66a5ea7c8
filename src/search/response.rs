//! Search response types

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{SearchError, SearchResult};

/// Shard accounting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub failed: u64,
}

/// Total hit count
///
/// Accepts both `{"value": n, "relation": "eq"}` and a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TotalRepr")]
pub struct TotalHits {
    pub value: u64,
    /// `eq` for exact counts, `gte` for lower bounds
    pub relation: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TotalRepr {
    Count(u64),
    Object {
        value: u64,
        #[serde(default = "default_relation")]
        relation: String,
    },
}

fn default_relation() -> String {
    "eq".to_string()
}

impl From<TotalRepr> for TotalHits {
    fn from(repr: TotalRepr) -> Self {
        match repr {
            TotalRepr::Count(value) => TotalHits {
                value,
                relation: default_relation(),
            },
            TotalRepr::Object { value, relation } => TotalHits { value, relation },
        }
    }
}

impl TotalHits {
    pub fn is_exact(&self) -> bool {
        self.relation == "eq"
    }
}

/// One matching document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    /// Sort values, present when the request sorted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<BTreeMap<String, Vec<String>>>,
}

impl Hit {
    /// Deserialize `_source` into a typed document
    pub fn source_as<D: DeserializeOwned>(&self) -> SearchResult<D> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| SearchError::malformed(format!("hit {} has no _source", self.id)))?;
        Ok(serde_json::from_value(source)?)
    }
}

/// The `hits` element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Decoded `_search` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(rename = "_shards", default)]
    pub shards: ShardStats,
    #[serde(default)]
    pub hits: HitsEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Map<String, Value>>,
    #[serde(rename = "_scroll_id", default, skip_serializing_if = "Option::is_none")]
    pub scroll_id: Option<String>,
}

impl SearchResponse {
    /// Total matches reported by the engine (0 when absent)
    pub fn total(&self) -> u64 {
        self.hits.total.as_ref().map(|t| t.value).unwrap_or(0)
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits.hits
    }

    /// Every `_source` deserialized into `D`
    pub fn sources<D: DeserializeOwned>(&self) -> SearchResult<Vec<D>> {
        self.hits.hits.iter().map(Hit::source_as).collect()
    }

    /// Compact JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Indented JSON
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl fmt::Display for SearchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pretty_json())
    }
}

/// Decoded `_count` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
    #[serde(rename = "_shards", default)]
    pub shards: ShardStats,
}

/// One bucket of a bucket aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct AggBucket {
    /// `key` for list buckets, the bucket name for keyed buckets
    pub key: Value,
    pub doc_count: u64,
    /// The whole bucket object, sub-aggregation results included
    pub body: Value,
}

impl AggBucket {
    fn from_value(key: Option<Value>, body: &Value) -> Self {
        Self {
            key: key.unwrap_or_else(|| body.get("key").cloned().unwrap_or(Value::Null)),
            doc_count: body.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
            body: body.clone(),
        }
    }

    /// Result of a sub-aggregation
    pub fn sub(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// `value` of a metric sub-aggregation
    pub fn sub_metric(&self, name: &str) -> Option<f64> {
        self.sub(name).and_then(|agg| agg.get("value")).and_then(Value::as_f64)
    }
}

/// Decoded aggregation search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(rename = "_shards", default)]
    pub shards: ShardStats,
    #[serde(default)]
    pub hits: HitsEnvelope,
    #[serde(default)]
    pub aggregations: Map<String, Value>,
}

impl AggregationResponse {
    /// Raw result of a top-level aggregation
    pub fn aggregation(&self, name: &str) -> Option<&Value> {
        self.aggregations.get(name)
    }

    /// `value` of a single-value metric
    pub fn metric_value(&self, name: &str) -> Option<f64> {
        self.aggregation(name)
            .and_then(|agg| agg.get("value"))
            .and_then(Value::as_f64)
    }

    /// Buckets of a bucket aggregation; keyed buckets keep response order
    pub fn buckets(&self, name: &str) -> Vec<AggBucket> {
        match self.aggregation(name).and_then(|agg| agg.get("buckets")) {
            Some(Value::Array(list)) => list.iter().map(|b| AggBucket::from_value(None, b)).collect(),
            Some(Value::Object(keyed)) => keyed
                .iter()
                .map(|(key, b)| AggBucket::from_value(Some(Value::String(key.clone())), b))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
