//! Query DSL request body builder
//!
//! This module assembles request bodies for an Elasticsearch-compatible
//! search API:
//! - Boolean filters (exists, terms, ids, regexp, AND, OR, NOT)
//! - Random scoring for deterministic sampling
//! - Terms, metric and histogram aggregations
//! - Composite aggregations with after-key pagination
//!
//! # Example
//!
//! ```
//! use querybody::query::Query;
//! use serde_json::json;
//!
//! let mut query = Query::new();
//! query.exists("Carrier", true);
//! query.term_aggs("carrier", "Carrier");
//! query.metric_aggs("avg_price", "avg", "AvgTicketPrice");
//! query.composite_agg("groupby_buckets", 10, true);
//!
//! assert_eq!(
//!     query.to_search_body(),
//!     json!({
//!         "aggs": {
//!             "groupby_buckets": {
//!                 "composite": {
//!                     "size": 10,
//!                     "sources": [{ "carrier": { "terms": { "field": "Carrier" } } }]
//!                 },
//!                 "aggregations": { "avg_price": { "avg": { "field": "AvgTicketPrice" } } }
//!             }
//!         },
//!         "query": { "exists": { "field": "Carrier" } }
//!     })
//! );
//! ```

pub mod aggs;
pub mod builder;
pub mod filter;

pub use aggs::{Aggregation, CompositeAggregation};
pub use builder::Query;
pub use filter::{BooleanFilter, RangeOp};
