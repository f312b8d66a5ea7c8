//! Leaf query clauses
//!
//! A `Fragment` is one single-key clause such as `{"term": {"status": "paid"}}`.
//! Fragments are not validated: unknown fields or bad values are only
//! rejected by the engine when the request executes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A single query clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(Value);

fn field_clause(kind: &str, field: impl Into<String>, body: Value) -> Fragment {
    let mut inner = Map::new();
    inner.insert(field.into(), body);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Fragment(Value::Object(outer))
}

fn strings<I, S>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(|s| Value::String(s.into())).collect()
}

impl Fragment {
    /// Full-text match
    pub fn match_query(field: impl Into<String>, value: impl Into<Value>) -> Self {
        field_clause("match", field, value.into())
    }

    pub fn match_phrase(field: impl Into<String>, value: impl Into<Value>) -> Self {
        field_clause("match_phrase", field, value.into())
    }

    /// Exact value
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        field_clause("term", field, value.into())
    }

    /// Any of several exact values
    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        field_clause("terms", field, Value::Array(values))
    }

    pub fn range(field: impl Into<String>, bounds: RangeBounds) -> Self {
        field_clause("range", field, bounds.render())
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Fragment(json!({"exists": {"field": field.into()}}))
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        field_clause("wildcard", field, Value::String(pattern.into()))
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        field_clause("prefix", field, Value::String(prefix.into()))
    }

    pub fn regexp(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        field_clause("regexp", field, Value::String(pattern.into()))
    }

    /// Edit-distance match; `fuzziness` is omitted when `None`
    pub fn fuzzy(field: impl Into<String>, value: impl Into<String>, fuzziness: Option<Value>) -> Self {
        let mut body = Map::new();
        body.insert("value".into(), Value::String(value.into()));
        if let Some(fuzziness) = fuzziness {
            body.insert("fuzziness".into(), fuzziness);
        }
        field_clause("fuzzy", field, Value::Object(body))
    }

    pub fn multi_match<I, S>(query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fragment(json!({
            "multi_match": {"query": query.into(), "fields": strings(fields)}
        }))
    }

    /// Lucene query syntax; `fields` is omitted when empty
    pub fn query_string<I, S>(query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut body = Map::new();
        body.insert("query".into(), Value::String(query.into()));
        let fields = strings(fields);
        if !fields.is_empty() {
            body.insert("fields".into(), Value::Array(fields));
        }
        let mut outer = Map::new();
        outer.insert("query_string".into(), Value::Object(body));
        Fragment(Value::Object(outer))
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fragment(json!({"ids": {"values": strings(ids)}}))
    }

    /// Points within `distance` (e.g. `"10km"`) of a coordinate
    pub fn geo_distance(field: impl Into<String>, lat: f64, lon: f64, distance: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("distance".into(), Value::String(distance.into()));
        body.insert(field.into(), json!({"lat": lat, "lon": lon}));
        let mut outer = Map::new();
        outer.insert("geo_distance".into(), Value::Object(body));
        Fragment(Value::Object(outer))
    }

    /// Points inside a box given as `(lat, lon)` corners
    pub fn geo_bounding_box(field: impl Into<String>, top_left: (f64, f64), bottom_right: (f64, f64)) -> Self {
        field_clause(
            "geo_bounding_box",
            field,
            json!({
                "top_left": {"lat": top_left.0, "lon": top_left.1},
                "bottom_right": {"lat": bottom_right.0, "lon": bottom_right.1}
            }),
        )
    }

    /// Clause evaluated against nested objects under `path`
    pub fn nested(path: impl Into<String>, inner: Fragment) -> Self {
        Fragment(json!({"nested": {"path": path.into(), "query": inner.0}}))
    }

    pub fn match_all() -> Self {
        Fragment(json!({"match_all": {}}))
    }

    /// Any pre-built clause
    pub fn raw(clause: Value) -> Self {
        Fragment(clause)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Fragment {
    fn from(value: Value) -> Self {
        Fragment(value)
    }
}

impl From<Fragment> for Value {
    fn from(fragment: Fragment) -> Self {
        fragment.0
    }
}

/// Range bounds; absent bounds are omitted from the clause
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    gte: Option<Value>,
    gt: Option<Value>,
    lte: Option<Value>,
    lt: Option<Value>,
    format: Option<String>,
}

impl RangeBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    /// Date format for string bounds
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Inclusive range from optional bounds
    pub fn between(gte: Option<Value>, lte: Option<Value>) -> Self {
        Self {
            gte,
            lte,
            ..Self::default()
        }
    }

    fn render(&self) -> Value {
        let mut body = Map::new();
        let bounds = [("gte", &self.gte), ("gt", &self.gt), ("lte", &self.lte), ("lt", &self.lt)];
        for (key, bound) in bounds {
            if let Some(value) = bound {
                body.insert(key.into(), value.clone());
            }
        }
        if let Some(format) = &self.format {
            body.insert("format".into(), Value::String(format.clone()));
        }
        Value::Object(body)
    }
}
