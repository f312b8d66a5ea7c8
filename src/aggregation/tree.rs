//! Aggregation tree assembler
//!
//! A tree maps unique names to nodes. Nesting is by name only: a child tree
//! is attached to a parent looked up by name, so no node can reference an
//! ancestor and the rendered structure is always acyclic.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use super::node::{AggKind, AggNode};
use crate::query::{Fragment, SortOrder};

/// Named aggregation clauses at one level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggTree {
    nodes: BTreeMap<String, AggNode>,
}

impl AggTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&AggNode> {
        self.nodes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Insert a node; an existing node with the same name is replaced
    pub fn add_node(&mut self, name: impl Into<String>, node: AggNode) -> &mut Self {
        self.nodes.insert(name.into(), node);
        self
    }

    pub fn add_metric(
        &mut self,
        name: impl Into<String>,
        agg_type: impl Into<String>,
        field: impl Into<String>,
        options: Map<String, Value>,
    ) -> &mut Self {
        self.add_node(name, AggNode::on_field(AggKind::Metric, agg_type, field, options))
    }

    pub fn add_bucket(
        &mut self,
        name: impl Into<String>,
        agg_type: impl Into<String>,
        field: impl Into<String>,
        options: Map<String, Value>,
    ) -> &mut Self {
        self.add_node(name, AggNode::on_field(AggKind::Bucket, agg_type, field, options))
    }

    /// Pipeline reading from `buckets_path`
    pub fn add_pipeline(
        &mut self,
        name: impl Into<String>,
        agg_type: impl Into<String>,
        buckets_path: impl Into<String>,
        options: Map<String, Value>,
    ) -> &mut Self {
        let mut body = Map::new();
        body.insert("buckets_path".into(), Value::String(buckets_path.into()));
        body.extend(options);
        self.add_node(name, AggNode::new(AggKind::Pipeline, agg_type, Value::Object(body)))
    }

    /// Bind `child` as the sub-aggregations of `parent`.
    ///
    /// Replaces any children the parent already had. Does nothing when no
    /// node is named `parent`.
    pub fn attach_sub(&mut self, parent: &str, child: AggTree) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(parent) {
            node.set_subs(child);
        }
        self
    }

    /// `{name: {type: body, "aggs": {...}}}` for every node
    pub fn render(&self) -> Value {
        let mut out = Map::new();
        for (name, node) in &self.nodes {
            out.insert(name.clone(), node.render());
        }
        Value::Object(out)
    }
}

fn options(pairs: Value) -> Map<String, Value> {
    match pairs {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Consuming shorthands for common aggregations
pub trait AggClauses: Sized {
    fn agg_tree_mut(&mut self) -> &mut AggTree;

    fn metric(mut self, name: impl Into<String>, agg_type: impl Into<String>, field: impl Into<String>) -> Self {
        self.agg_tree_mut().add_metric(name, agg_type, field, Map::new());
        self
    }

    fn bucket(
        mut self,
        name: impl Into<String>,
        agg_type: impl Into<String>,
        field: impl Into<String>,
        options: Map<String, Value>,
    ) -> Self {
        self.agg_tree_mut().add_bucket(name, agg_type, field, options);
        self
    }

    fn pipeline(
        mut self,
        name: impl Into<String>,
        agg_type: impl Into<String>,
        buckets_path: impl Into<String>,
        options: Map<String, Value>,
    ) -> Self {
        self.agg_tree_mut().add_pipeline(name, agg_type, buckets_path, options);
        self
    }

    fn sub_aggs(mut self, parent: &str, child: AggTree) -> Self {
        self.agg_tree_mut().attach_sub(parent, child);
        self
    }

    // ==================
    // Metrics
    // ==================

    fn avg(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "avg", field)
    }

    fn sum(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "sum", field)
    }

    fn min(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "min", field)
    }

    fn max(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "max", field)
    }

    fn value_count(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "value_count", field)
    }

    fn stats(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "stats", field)
    }

    fn extended_stats(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "extended_stats", field)
    }

    fn cardinality(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "cardinality", field)
    }

    /// `percents` is omitted when empty (engine defaults apply)
    fn percentiles(mut self, name: impl Into<String>, field: impl Into<String>, percents: &[f64]) -> Self {
        let opts = if percents.is_empty() {
            Map::new()
        } else {
            options(json!({"percents": percents}))
        };
        self.agg_tree_mut().add_metric(name, "percentiles", field, opts);
        self
    }

    fn geo_bounds(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "geo_bounds", field)
    }

    fn geo_centroid(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.metric(name, "geo_centroid", field)
    }

    // ==================
    // Buckets
    // ==================

    fn terms(self, name: impl Into<String>, field: impl Into<String>, size: Option<usize>) -> Self {
        let opts = size.map(|s| options(json!({"size": s}))).unwrap_or_default();
        self.bucket(name, "terms", field, opts)
    }

    /// Terms ordered by a key such as `_count`, `_key` or a metric name
    fn terms_ordered(
        self,
        name: impl Into<String>,
        field: impl Into<String>,
        size: Option<usize>,
        order_by: &str,
        order: SortOrder,
    ) -> Self {
        let mut opts = options(json!({"order": {order_by: order.as_str()}}));
        if let Some(size) = size {
            opts.insert("size".into(), Value::from(size));
        }
        self.bucket(name, "terms", field, opts)
    }

    fn histogram(self, name: impl Into<String>, field: impl Into<String>, interval: f64) -> Self {
        self.bucket(name, "histogram", field, options(json!({"interval": interval})))
    }

    /// Calendar-aware interval such as `1d`, `1w`, `1M`
    fn date_histogram(self, name: impl Into<String>, field: impl Into<String>, interval: &str) -> Self {
        self.bucket(name, "date_histogram", field, options(json!({"calendar_interval": interval})))
    }

    /// Fixed interval such as `30s`, `1h`
    fn date_histogram_fixed(self, name: impl Into<String>, field: impl Into<String>, interval: &str) -> Self {
        self.bucket(name, "date_histogram", field, options(json!({"fixed_interval": interval})))
    }

    /// Ranges are `{"from": .., "to": .., "key": ..}` objects
    fn range(self, name: impl Into<String>, field: impl Into<String>, ranges: Vec<Value>) -> Self {
        self.bucket(name, "range", field, options(json!({"ranges": ranges})))
    }

    fn date_range(self, name: impl Into<String>, field: impl Into<String>, ranges: Vec<Value>) -> Self {
        self.bucket(name, "date_range", field, options(json!({"ranges": ranges})))
    }

    fn missing(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.bucket(name, "missing", field, Map::new())
    }

    /// Distance rings around `origin` given as `(lat, lon)`
    fn geo_distance(
        self,
        name: impl Into<String>,
        field: impl Into<String>,
        origin: (f64, f64),
        ranges: Vec<Value>,
    ) -> Self {
        let opts = options(json!({
            "origin": {"lat": origin.0, "lon": origin.1},
            "ranges": ranges
        }));
        self.bucket(name, "geo_distance", field, opts)
    }

    /// Single bucket of documents matching `filter`
    fn filter(mut self, name: impl Into<String>, filter: Fragment) -> Self {
        let node = AggNode::new(AggKind::Bucket, "filter", filter.into_value());
        self.agg_tree_mut().add_node(name, node);
        self
    }

    /// One bucket per named filter
    fn filters<I, S>(mut self, name: impl Into<String>, filters: I) -> Self
    where
        I: IntoIterator<Item = (S, Fragment)>,
        S: Into<String>,
    {
        let named: Map<String, Value> = filters
            .into_iter()
            .map(|(key, fragment)| (key.into(), fragment.into_value()))
            .collect();
        let node = AggNode::new(AggKind::Bucket, "filters", json!({"filters": named}));
        self.agg_tree_mut().add_node(name, node);
        self
    }

    // ==================
    // Pipelines
    // ==================

    fn avg_bucket(self, name: impl Into<String>, buckets_path: impl Into<String>) -> Self {
        self.pipeline(name, "avg_bucket", buckets_path, Map::new())
    }

    fn sum_bucket(self, name: impl Into<String>, buckets_path: impl Into<String>) -> Self {
        self.pipeline(name, "sum_bucket", buckets_path, Map::new())
    }

    fn max_bucket(self, name: impl Into<String>, buckets_path: impl Into<String>) -> Self {
        self.pipeline(name, "max_bucket", buckets_path, Map::new())
    }

    fn min_bucket(self, name: impl Into<String>, buckets_path: impl Into<String>) -> Self {
        self.pipeline(name, "min_bucket", buckets_path, Map::new())
    }

    fn moving_avg(self, name: impl Into<String>, buckets_path: impl Into<String>, window: usize) -> Self {
        self.pipeline(name, "moving_avg", buckets_path, options(json!({"window": window})))
    }

    fn derivative(self, name: impl Into<String>, buckets_path: impl Into<String>) -> Self {
        self.pipeline(name, "derivative", buckets_path, Map::new())
    }

    fn cumulative_sum(self, name: impl Into<String>, buckets_path: impl Into<String>) -> Self {
        self.pipeline(name, "cumulative_sum", buckets_path, Map::new())
    }
}

impl AggClauses for AggTree {
    fn agg_tree_mut(&mut self) -> &mut AggTree {
        self
    }
}
