//! Search requests and responses
//!
//! - `SearchBuilder`: `_search` / `_count`
//! - `AggregationBuilder`: aggregation-only `_search`
//! - `DeleteByQueryBuilder`, `UpdateByQueryBuilder`: by-query writes

mod builder;
mod by_query;
mod request;
mod response;

pub use builder::{AggregationBuilder, SearchBuilder};
pub use by_query::{ByQueryResponse, DeleteByQueryBuilder, Retries, UpdateByQueryBuilder};
pub use request::SearchRequest;
pub use response::{
    AggBucket, AggregationResponse, CountResponse, Hit, HitsEnvelope, SearchResponse, ShardStats, TotalHits,
};
