//! Aggregation nodes

use std::fmt;

use serde_json::{Map, Value};

use super::tree::AggTree;

/// Aggregation family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    /// Computes a value over matching documents (`avg`, `stats`, ...)
    Metric,
    /// Groups documents into buckets (`terms`, `histogram`, ...)
    Bucket,
    /// Computes over the output of other aggregations (`avg_bucket`, ...)
    Pipeline,
}

impl AggKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggKind::Metric => "metric",
            AggKind::Bucket => "bucket",
            AggKind::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for AggKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One named aggregation clause plus its optional children
#[derive(Debug, Clone, PartialEq)]
pub struct AggNode {
    kind: AggKind,
    agg_type: String,
    body: Value,
    subs: Option<AggTree>,
}

impl AggNode {
    pub fn new(kind: AggKind, agg_type: impl Into<String>, body: Value) -> Self {
        Self {
            kind,
            agg_type: agg_type.into(),
            body,
            subs: None,
        }
    }

    /// Node whose body is `{"field": field, ...options}`
    pub fn on_field(kind: AggKind, agg_type: impl Into<String>, field: impl Into<String>, options: Map<String, Value>) -> Self {
        let mut body = Map::new();
        body.insert("field".into(), Value::String(field.into()));
        body.extend(options);
        Self::new(kind, agg_type, Value::Object(body))
    }

    pub fn kind(&self) -> AggKind {
        self.kind
    }

    pub fn agg_type(&self) -> &str {
        &self.agg_type
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn sub_tree(&self) -> Option<&AggTree> {
        self.subs.as_ref()
    }

    pub(crate) fn set_subs(&mut self, subs: AggTree) {
        self.subs = Some(subs);
    }

    /// `{agg_type: body}` plus `"aggs"` when children exist
    pub fn render(&self) -> Value {
        let mut clause = Map::new();
        clause.insert(self.agg_type.clone(), self.body.clone());
        if let Some(subs) = self.subs.as_ref().filter(|s| !s.is_empty()) {
            clause.insert("aggs".into(), subs.render());
        }
        Value::Object(clause)
    }
}
