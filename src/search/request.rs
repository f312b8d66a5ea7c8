//! Search request body

use serde_json::{json, Map, Value};

use crate::aggregation::AggTree;
use crate::query::{render_sort, BoolQuery, SortSpec};

/// Everything a `_search` body can carry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query: BoolQuery,
    /// Emit an explicit `match_all` when the bool query is empty
    pub match_all: bool,
    pub from: Option<usize>,
    pub size: Option<usize>,
    pub sort: Vec<SortSpec>,
    /// `_source` includes; empty means the whole document
    pub source: Vec<String>,
    pub aggs: AggTree,
    pub highlight: Vec<String>,
    pub min_score: Option<f64>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `query` element, if any
    pub fn query_value(&self) -> Option<Value> {
        match self.query.to_query() {
            Some(query) => Some(query),
            None if self.match_all => Some(json!({"match_all": {}})),
            None => None,
        }
    }

    /// Render the request body
    ///
    /// Keys appear in a fixed order: query, min_score, from, size, sort,
    /// _source, aggs, highlight. Empty parts are omitted.
    pub fn render(&self) -> Value {
        let mut body = Map::new();

        if let Some(query) = self.query_value() {
            body.insert("query".into(), query);
        }
        if let Some(min_score) = self.min_score {
            body.insert("min_score".into(), Value::from(min_score));
        }
        if let Some(from) = self.from {
            body.insert("from".into(), Value::from(from));
        }
        if let Some(size) = self.size {
            body.insert("size".into(), Value::from(size));
        }
        if !self.sort.is_empty() {
            body.insert("sort".into(), render_sort(&self.sort));
        }
        if !self.source.is_empty() {
            body.insert("_source".into(), json!(self.source));
        }
        if !self.aggs.is_empty() {
            body.insert("aggs".into(), self.aggs.render());
        }
        if !self.highlight.is_empty() {
            let fields: Map<String, Value> = self
                .highlight
                .iter()
                .map(|field| (field.clone(), json!({})))
                .collect();
            body.insert("highlight".into(), json!({"fields": fields}));
        }

        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggClauses;
    use crate::query::BoolClauses;

    #[test]
    fn test_empty_request() {
        assert_eq!(SearchRequest::new().render(), json!({}));
    }

    #[test]
    fn test_match_all_only_when_bool_empty() {
        let mut request = SearchRequest { match_all: true, ..SearchRequest::default() };
        assert_eq!(request.render(), json!({"query": {"match_all": {}}}));

        request.query = BoolQuery::new().term("a", 1);
        assert_eq!(request.render()["query"], json!({"bool": {"filter": [{"term": {"a": 1}}]}}));
    }

    #[test]
    fn test_full_request() {
        let request = SearchRequest {
            query: BoolQuery::new().match_query("title", "rust"),
            match_all: false,
            from: Some(20),
            size: Some(10),
            sort: vec![SortSpec::desc("created")],
            source: vec!["title".into(), "created".into()],
            aggs: AggTree::new().cardinality("authors", "author"),
            highlight: vec!["title".into()],
            min_score: Some(0.5),
        };

        assert_eq!(
            request.render(),
            json!({
                "query": {"bool": {"must": [{"match": {"title": "rust"}}]}},
                "min_score": 0.5,
                "from": 20,
                "size": 10,
                "sort": [{"created": "desc"}],
                "_source": ["title", "created"],
                "aggs": {"authors": {"cardinality": {"field": "author"}}},
                "highlight": {"fields": {"title": {}}}
            })
        );
    }
}
