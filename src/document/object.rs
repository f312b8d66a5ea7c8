//! Nested JSON object builder

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{SearchError, SearchResult};

/// Consuming builder for a JSON object with nested objects and arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectBuilder {
    fields: Map<String, Value>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Nested object built by `build`
    pub fn set_object<F>(self, key: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(ObjectBuilder) -> ObjectBuilder,
    {
        let nested = build(ObjectBuilder::new());
        self.set(key, nested.into_value())
    }

    pub fn set_array<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.set(key, Value::Array(values))
    }

    /// Array of nested objects, one per builder closure
    pub fn set_object_array<I, F>(self, key: impl Into<String>, builds: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(ObjectBuilder) -> ObjectBuilder,
    {
        let values: Vec<Value> = builds
            .into_iter()
            .map(|build| build(ObjectBuilder::new()).into_value())
            .collect();
        self.set(key, Value::Array(values))
    }

    /// Merge the fields of any value that serializes to a JSON object
    pub fn set_from<S: Serialize + ?Sized>(mut self, data: &S) -> SearchResult<Self> {
        let fields = object_fields(data)?;
        self.fields.extend(fields);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for ObjectBuilder {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Fields of a value that must serialize to a JSON object
pub(crate) fn object_fields<S: Serialize + ?Sized>(data: &S) -> SearchResult<Map<String, Value>> {
    match serde_json::to_value(data).map_err(SearchError::Encode)? {
        Value::Object(fields) => Ok(fields),
        other => Err(SearchError::Encode(serde::ser::Error::custom(format!(
            "expected a value serializing to an object, got {}",
            kind_of(&other)
        )))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
