//! Boolean query assembler
//!
//! Fragments go into one of four buckets:
//! - `must`: narrows the result set and scores
//! - `filter`: narrows without scoring
//! - `should`: contributes to scoring; with `minimum_should_match` acts as OR
//! - `must_not`: excludes
//!
//! Rendering rules:
//! - all buckets empty: `{}` (callers substitute match-all or omit the query)
//! - otherwise one `bool` wrapper holding only the non-empty buckets, each in
//!   insertion order
//! - `minimum_should_match` is emitted only when `should` is non-empty

use serde_json::{Map, Value};

use super::fragment::{Fragment, RangeBounds};

/// Threshold for `should` clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinimumShouldMatch {
    /// Absolute clause count (negative counts are "all but n")
    Count(i64),
    /// Expression such as `"75%"` or `"3<90%"`
    Expr(String),
}

impl MinimumShouldMatch {
    fn render(&self) -> Value {
        match self {
            MinimumShouldMatch::Count(n) => Value::from(*n),
            MinimumShouldMatch::Expr(expr) => Value::from(expr.as_str()),
        }
    }
}

impl From<i64> for MinimumShouldMatch {
    fn from(n: i64) -> Self {
        MinimumShouldMatch::Count(n)
    }
}

impl From<i32> for MinimumShouldMatch {
    fn from(n: i32) -> Self {
        MinimumShouldMatch::Count(i64::from(n))
    }
}

impl From<&str> for MinimumShouldMatch {
    fn from(expr: &str) -> Self {
        MinimumShouldMatch::Expr(expr.to_string())
    }
}

impl From<String> for MinimumShouldMatch {
    fn from(expr: String) -> Self {
        MinimumShouldMatch::Expr(expr)
    }
}

/// must/filter/should/must_not composition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    must: Vec<Fragment>,
    filter: Vec<Fragment>,
    should: Vec<Fragment>,
    must_not: Vec<Fragment>,
    minimum_should_match: Option<MinimumShouldMatch>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_must(&mut self, fragment: Fragment) -> &mut Self {
        self.must.push(fragment);
        self
    }

    pub fn add_filter(&mut self, fragment: Fragment) -> &mut Self {
        self.filter.push(fragment);
        self
    }

    pub fn add_should(&mut self, fragment: Fragment) -> &mut Self {
        self.should.push(fragment);
        self
    }

    pub fn add_must_not(&mut self, fragment: Fragment) -> &mut Self {
        self.must_not.push(fragment);
        self
    }

    /// Record the `should` threshold; ignored while `should` is empty
    pub fn set_minimum_should_match(&mut self, threshold: impl Into<MinimumShouldMatch>) -> &mut Self {
        self.minimum_should_match = Some(threshold.into());
        self
    }

    /// True when all four buckets are empty
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.filter.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }

    /// Total number of fragments across buckets
    pub fn clause_count(&self) -> usize {
        self.must.len() + self.filter.len() + self.should.len() + self.must_not.len()
    }

    pub fn must_clauses(&self) -> &[Fragment] {
        &self.must
    }

    pub fn filter_clauses(&self) -> &[Fragment] {
        &self.filter
    }

    pub fn should_clauses(&self) -> &[Fragment] {
        &self.should
    }

    pub fn must_not_clauses(&self) -> &[Fragment] {
        &self.must_not
    }

    /// Render the query object (`{}` when empty)
    pub fn render(&self) -> Value {
        if self.is_empty() {
            return Value::Object(Map::new());
        }

        let mut body = Map::new();
        let buckets = [
            ("must", &self.must),
            ("filter", &self.filter),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ];
        for (key, fragments) in buckets {
            if !fragments.is_empty() {
                let list = fragments.iter().map(|f| f.as_value().clone()).collect();
                body.insert(key.to_string(), Value::Array(list));
            }
        }
        if !self.should.is_empty() {
            if let Some(threshold) = &self.minimum_should_match {
                body.insert("minimum_should_match".into(), threshold.render());
            }
        }

        let mut wrapper = Map::new();
        wrapper.insert("bool".into(), Value::Object(body));
        Value::Object(wrapper)
    }

    /// The rendered query, or `None` when empty
    pub fn to_query(&self) -> Option<Value> {
        (!self.is_empty()).then(|| self.render())
    }
}

impl From<BoolQuery> for Fragment {
    /// Nest a whole bool query as a clause; empty queries become match-all
    fn from(query: BoolQuery) -> Self {
        match query.to_query() {
            Some(rendered) => Fragment::raw(rendered),
            None => Fragment::match_all(),
        }
    }
}

/// Consuming clause methods shared by every builder that owns a `BoolQuery`
///
/// Full-text and pattern clauses land in `must`; exact, range and geo clauses
/// land in `filter`.
pub trait BoolClauses: Sized {
    fn bool_query_mut(&mut self) -> &mut BoolQuery;

    fn must(mut self, fragment: Fragment) -> Self {
        self.bool_query_mut().add_must(fragment);
        self
    }

    fn filter(mut self, fragment: Fragment) -> Self {
        self.bool_query_mut().add_filter(fragment);
        self
    }

    fn should(mut self, fragment: Fragment) -> Self {
        self.bool_query_mut().add_should(fragment);
        self
    }

    fn must_not(mut self, fragment: Fragment) -> Self {
        self.bool_query_mut().add_must_not(fragment);
        self
    }

    fn minimum_should_match(mut self, threshold: impl Into<MinimumShouldMatch>) -> Self {
        self.bool_query_mut().set_minimum_should_match(threshold);
        self
    }

    fn match_query(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must(Fragment::match_query(field, value))
    }

    fn match_phrase(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must(Fragment::match_phrase(field, value))
    }

    fn term(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Fragment::term(field, value))
    }

    fn terms<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(Fragment::terms(field, values))
    }

    fn range(self, field: impl Into<String>, bounds: RangeBounds) -> Self {
        self.filter(Fragment::range(field, bounds))
    }

    fn exists(self, field: impl Into<String>) -> Self {
        self.filter(Fragment::exists(field))
    }

    fn wildcard(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.must(Fragment::wildcard(field, pattern))
    }

    fn prefix(self, field: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.must(Fragment::prefix(field, prefix))
    }

    fn regexp(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.must(Fragment::regexp(field, pattern))
    }

    fn fuzzy(self, field: impl Into<String>, value: impl Into<String>, fuzziness: Option<Value>) -> Self {
        self.must(Fragment::fuzzy(field, value, fuzziness))
    }

    fn multi_match<I, S>(self, query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must(Fragment::multi_match(query, fields))
    }

    fn query_string<I, S>(self, query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must(Fragment::query_string(query, fields))
    }

    fn ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter(Fragment::ids(ids))
    }

    fn geo_distance(self, field: impl Into<String>, lat: f64, lon: f64, distance: impl Into<String>) -> Self {
        self.filter(Fragment::geo_distance(field, lat, lon, distance))
    }

    fn geo_bounding_box(self, field: impl Into<String>, top_left: (f64, f64), bottom_right: (f64, f64)) -> Self {
        self.filter(Fragment::geo_bounding_box(field, top_left, bottom_right))
    }

    fn nested(self, path: impl Into<String>, inner: Fragment) -> Self {
        self.must(Fragment::nested(path, inner))
    }

    /// Exclude documents whose `field` equals `value`
    fn exclude(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must_not(Fragment::term(field, value))
    }
}

impl BoolClauses for BoolQuery {
    fn bool_query_mut(&mut self) -> &mut BoolQuery {
        self
    }
}
