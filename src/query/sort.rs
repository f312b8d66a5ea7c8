//! Sort specifications

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::errors::SearchError;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(SearchError::Config(format!("unknown sort order '{}'", other))),
        }
    }
}

/// One sort criterion
///
/// Renders as `{field: order}`, or `{field: {"order": order, ...}}` when extra
/// options such as `missing` or `mode` are present.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
    options: Map<String, Value>,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
            options: Map::new(),
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Desc)
    }

    /// Document id ascending, the tie-breaker used when no sort is given
    pub fn id_tiebreaker() -> Self {
        Self::asc("_id")
    }

    /// Extra option, e.g. `("missing", "_last")`
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn render(&self) -> Value {
        let spec = if self.options.is_empty() {
            Value::from(self.order.as_str())
        } else {
            let mut body = Map::new();
            body.insert("order".into(), Value::from(self.order.as_str()));
            for (key, value) in &self.options {
                body.insert(key.clone(), value.clone());
            }
            Value::Object(body)
        };
        let mut outer = Map::new();
        outer.insert(self.field.clone(), spec);
        Value::Object(outer)
    }
}

/// Render a list of sort criteria
pub fn render_sort(specs: &[SortSpec]) -> Value {
    Value::Array(specs.iter().map(SortSpec::render).collect())
}
