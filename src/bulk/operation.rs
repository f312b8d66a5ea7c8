//! Bulk operations and their newline-delimited encoding
//!
//! Each operation renders as an action line, followed by a payload line for
//! everything except `delete`. Lines are written in queue order.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::errors::{SearchError, SearchResult};

/// Bulk action tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Index,
    Create,
    Update,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Create => "create",
            BulkAction::Update => "update",
            BulkAction::Delete => "delete",
        }
    }

    /// Whether the target must name a document id
    pub fn requires_id(&self) -> bool {
        !matches!(self, BulkAction::Index)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "index" => Some(BulkAction::Index),
            "create" => Some(BulkAction::Create),
            "update" => Some(BulkAction::Update),
            "delete" => Some(BulkAction::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index and optional id an operation applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkTarget {
    pub index: String,
    pub id: Option<String>,
}

impl BulkTarget {
    /// Resolve `index`/`id` against the accumulator default.
    ///
    /// An empty index falls back to `default_index`; an empty id counts as
    /// absent.
    pub fn resolve(
        action: BulkAction,
        index: &str,
        id: Option<&str>,
        default_index: Option<&str>,
    ) -> SearchResult<Self> {
        let index = match (index.is_empty(), default_index) {
            (false, _) => index.to_string(),
            (true, Some(default)) if !default.is_empty() => default.to_string(),
            _ => return Err(SearchError::missing_field("index")),
        };
        let id = id.filter(|id| !id.is_empty()).map(str::to_string);
        if action.requires_id() && id.is_none() {
            return Err(SearchError::missing_field("id"));
        }
        Ok(Self { index, id })
    }

    /// `index/id`, or just the index when no id was given
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => format!("{}/{}", self.index, id),
            None => self.index.clone(),
        }
    }
}

/// One queued operation
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    action: BulkAction,
    target: BulkTarget,
    doc: Option<Map<String, Value>>,
    upsert: bool,
}

impl BulkOperation {
    pub fn index(target: BulkTarget, doc: Map<String, Value>) -> Self {
        Self::with_doc(BulkAction::Index, target, doc)
    }

    pub fn create(target: BulkTarget, doc: Map<String, Value>) -> Self {
        Self::with_doc(BulkAction::Create, target, doc)
    }

    pub fn update(target: BulkTarget, doc: Map<String, Value>) -> Self {
        Self::with_doc(BulkAction::Update, target, doc)
    }

    /// Partial update that creates the document when it does not exist
    pub fn upsert(target: BulkTarget, doc: Map<String, Value>) -> Self {
        Self {
            upsert: true,
            ..Self::with_doc(BulkAction::Update, target, doc)
        }
    }

    pub fn delete(target: BulkTarget) -> Self {
        Self {
            action: BulkAction::Delete,
            target,
            doc: None,
            upsert: false,
        }
    }

    fn with_doc(action: BulkAction, target: BulkTarget, doc: Map<String, Value>) -> Self {
        Self {
            action,
            target,
            doc: Some(doc),
            upsert: false,
        }
    }

    pub fn action(&self) -> BulkAction {
        self.action
    }

    pub fn target(&self) -> &BulkTarget {
        &self.target
    }

    pub fn doc(&self) -> Option<&Map<String, Value>> {
        self.doc.as_ref()
    }

    pub(crate) fn doc_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.doc.as_mut()
    }

    /// `{"<action>": {"_index": ..., "_id"?: ...}}`
    pub fn action_line(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("_index".into(), Value::String(self.target.index.clone()));
        if let Some(id) = &self.target.id {
            meta.insert("_id".into(), Value::String(id.clone()));
        }
        let mut line = Map::new();
        line.insert(self.action.as_str().into(), Value::Object(meta));
        Value::Object(line)
    }

    /// Payload line; `None` for `delete`
    pub fn payload_line(&self) -> Option<Value> {
        let doc = Value::Object(self.doc.clone()?);
        match (self.action, self.upsert) {
            (BulkAction::Delete, _) => None,
            (BulkAction::Update, true) => Some(json!({"doc": doc, "doc_as_upsert": true})),
            (BulkAction::Update, false) => Some(json!({"doc": doc})),
            _ => Some(doc),
        }
    }

    /// Append this operation's lines, each newline-terminated
    pub fn write_lines(&self, out: &mut Vec<u8>) -> SearchResult<()> {
        serde_json::to_writer(&mut *out, &self.action_line()).map_err(SearchError::Encode)?;
        out.push(b'\n');
        if let Some(payload) = self.payload_line() {
            serde_json::to_writer(&mut *out, &payload).map_err(SearchError::Encode)?;
            out.push(b'\n');
        }
        Ok(())
    }
}

/// Encode operations as one newline-delimited body
pub fn encode_operations<'o, I>(operations: I) -> SearchResult<Vec<u8>>
where
    I: IntoIterator<Item = &'o BulkOperation>,
{
    let mut out = Vec::new();
    for op in operations {
        op.write_lines(&mut out)?;
    }
    Ok(out)
}
