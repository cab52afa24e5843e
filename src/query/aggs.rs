//! Aggregation definitions
//!
//! Each `Aggregation` renders to the JSON body the engine expects under a
//! named entry of `"aggs"`:
//!
//! ```json
//! {
//!   "aggs": {
//!     "carriers": { "terms": { "field": "Carrier", "size": 10 } },
//!     "max_price": { "max": { "field": "AvgTicketPrice" } },
//!     "price_hist": { "histogram": { "field": "AvgTicketPrice", "interval": 50.0, "offset": 100.0 } }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Bucketing function whose aggregations become composite sources
pub const TERMS: &str = "terms";

/// A single named aggregation
#[derive(Clone, Debug, PartialEq)]
pub enum Aggregation {
    /// Bucketing aggregation such as `terms`
    Bucket {
        func: String,
        field: String,
        /// Maximum number of buckets; omitted from the body when `None`
        size: Option<u64>,
        /// Value of `missing_bucket` when missing values get their own bucket
        missing_bucket: Option<String>,
    },
    /// Single-value metric such as `max` or `avg`
    Metric { func: String, field: String },
    /// Fixed-interval numeric histogram
    Histogram {
        field: String,
        interval: f64,
        /// Lower bound echoed as given, so integer bounds stay integers
        offset: Value,
    },
    /// Paginated multi-source bucketing
    Composite(CompositeAggregation),
}

/// Composite aggregation built from previously registered aggregations
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeAggregation {
    /// Page size
    pub size: u64,
    /// Bucketing keys, in registration order
    pub sources: Vec<(String, Aggregation)>,
    /// Cursor returned with the previous page
    pub after: Option<Map<String, Value>>,
    /// Metrics computed per bucket
    pub aggregations: IndexMap<String, Aggregation>,
}

impl Aggregation {
    /// Create a bucketing aggregation with a size cap
    pub fn bucket(func: impl Into<String>, field: impl Into<String>, size: u64) -> Self {
        Aggregation::Bucket {
            func: func.into(),
            field: field.into(),
            size: Some(size),
            missing_bucket: None,
        }
    }

    /// Create an uncapped `terms` aggregation
    pub fn terms(field: impl Into<String>) -> Self {
        Aggregation::Bucket {
            func: TERMS.to_string(),
            field: field.into(),
            size: None,
            missing_bucket: None,
        }
    }

    /// Create a metric aggregation
    pub fn metric(func: impl Into<String>, field: impl Into<String>) -> Self {
        Aggregation::Metric {
            func: func.into(),
            field: field.into(),
        }
    }

    /// Create a histogram aggregation
    pub fn histogram(field: impl Into<String>, interval: f64, offset: impl Into<Value>) -> Self {
        Aggregation::Histogram {
            field: field.into(),
            interval,
            offset: offset.into(),
        }
    }

    /// Whether this aggregation renders as `{"terms": ...}` and so becomes a composite source
    pub fn is_terms(&self) -> bool {
        matches!(
            self,
            Aggregation::Bucket { func, .. } | Aggregation::Metric { func, .. } if func == TERMS
        )
    }

    /// Convert a terms-shaped aggregation into a composite source
    ///
    /// Returns `self` unchanged when it is not terms-shaped.
    pub fn into_source(self, missing_bucket: Option<String>) -> Aggregation {
        match self {
            Aggregation::Bucket {
                func, field, size, ..
            } if func == TERMS => Aggregation::Bucket {
                func,
                field,
                size,
                missing_bucket,
            },
            Aggregation::Metric { func, field } if func == TERMS => Aggregation::Bucket {
                func,
                field,
                size: None,
                missing_bucket,
            },
            other => other,
        }
    }

    pub fn as_composite_mut(&mut self) -> Option<&mut CompositeAggregation> {
        match self {
            Aggregation::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    /// Render this aggregation as Query DSL JSON
    pub fn build(&self) -> Value {
        match self {
            Aggregation::Bucket {
                func,
                field,
                size,
                missing_bucket,
            } => {
                let mut body = Map::new();
                body.insert("field".to_string(), json!(field));
                if let Some(size) = size {
                    body.insert("size".to_string(), json!(size));
                }
                if let Some(missing) = missing_bucket {
                    body.insert("missing_bucket".to_string(), json!(missing));
                }
                json!({ func.as_str(): body })
            }
            Aggregation::Metric { func, field } => json!({ func.as_str(): { "field": field } }),
            Aggregation::Histogram {
                field,
                interval,
                offset,
            } => json!({
                "histogram": { "field": field, "interval": interval, "offset": offset }
            }),
            Aggregation::Composite(composite) => composite.build(),
        }
    }
}

impl CompositeAggregation {
    /// Render the composite body and its nested aggregations
    pub fn build(&self) -> Value {
        let sources: Vec<Value> = self
            .sources
            .iter()
            .map(|(name, agg)| json!({ name.as_str(): agg.build() }))
            .collect();

        let mut composite = Map::new();
        composite.insert("size".to_string(), json!(self.size));
        composite.insert("sources".to_string(), Value::Array(sources));
        if let Some(after) = &self.after {
            composite.insert("after".to_string(), Value::Object(after.clone()));
        }

        json!({
            "composite": composite,
            "aggregations": render_map(&self.aggregations),
        })
    }
}

/// Render a named aggregation map, keeping insertion order
pub fn render_map(aggs: &IndexMap<String, Aggregation>) -> Value {
    Value::Object(
        aggs.iter()
            .map(|(name, agg)| (name.clone(), agg.build()))
            .collect(),
    )
}

impl Serialize for Aggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.build().serialize(serializer)
    }
}
