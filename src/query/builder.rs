//! Incremental query builder
//!
//! `Query` accumulates filter predicates and named aggregations, then renders
//! them into a search body or a count body.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::config::QuerySettings;
use crate::error::{QueryError, Result};

use super::aggs::{render_map, Aggregation, CompositeAggregation};
use super::filter::{BooleanFilter, IDS_FIELD};

/// Builder for search and count request bodies
///
/// Cloning a `Query` deep-copies both the filter tree and the aggregations, so
/// the clone can be mutated without affecting the original.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    filter: BooleanFilter,
    aggs: IndexMap<String, Aggregation>,
    settings: QuerySettings,
}

impl Query {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty query with custom settings
    pub fn with_settings(settings: QuerySettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Create an independent copy of `other`
    pub fn copy_of(other: &Query) -> Self {
        other.clone()
    }

    /// Current filter tree
    pub fn filter(&self) -> &BooleanFilter {
        &self.filter
    }

    /// Registered aggregations, in registration order
    pub fn aggregations(&self) -> &IndexMap<String, Aggregation> {
        &self.aggs
    }

    /// Look up a registered aggregation by name
    pub fn aggregation(&self, name: &str) -> Option<&Aggregation> {
        self.aggs.get(name)
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    fn and_filter(&mut self, predicate: BooleanFilter) {
        let current = std::mem::take(&mut self.filter);
        self.filter = if current.is_empty() {
            predicate
        } else {
            current & predicate
        };
    }

    /// Require `field` to exist (`must`) or to be missing (`!must`)
    pub fn exists(&mut self, field: impl Into<String>, must: bool) {
        let predicate = if must {
            BooleanFilter::not_null(field)
        } else {
            BooleanFilter::is_null(field)
        };
        self.and_filter(predicate);
    }

    /// Restrict matches to (or exclude) the given document ids
    pub fn ids<I, V>(&mut self, items: I, must: bool)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let predicate = BooleanFilter::is_in(IDS_FIELD, items);
        self.and_filter(if must { predicate } else { !predicate });
    }

    /// Restrict `field` to (or exclude) a set of values
    ///
    /// When `must` is false the whole membership test is negated.
    pub fn terms<I, S>(&mut self, field: impl Into<String>, items: I, must: bool)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let predicate = BooleanFilter::is_in(field, items.into_iter().map(Into::<String>::into));
        self.and_filter(if must { predicate } else { !predicate });
    }

    /// Require `field` to match a regular expression
    pub fn regexp(&mut self, field: impl Into<String>, pattern: impl Into<String>) {
        self.and_filter(BooleanFilter::rlike(field, pattern));
    }

    /// AND an arbitrary predicate onto the current filter
    pub fn update_boolean_filter(&mut self, predicate: BooleanFilter) {
        self.and_filter(predicate);
    }

    /// Wrap the whole current filter in a seeded random score
    pub fn random_score(&mut self, seed: i64) {
        let current = std::mem::take(&mut self.filter);
        self.filter = BooleanFilter::random_score(
            current,
            Some(seed),
            self.settings.random_score_field.clone(),
        );
    }

    /// Register `{func: {field, size}}` under `name`
    pub fn terms_aggs(
        &mut self,
        name: impl Into<String>,
        func: impl Into<String>,
        field: impl Into<String>,
        size: u64,
    ) {
        self.aggs
            .insert(name.into(), Aggregation::bucket(func, field, size));
    }

    /// Register `{func: {field}}` under `name`
    pub fn metric_aggs(
        &mut self,
        name: impl Into<String>,
        func: impl Into<String>,
        field: impl Into<String>,
    ) {
        self.aggs.insert(name.into(), Aggregation::metric(func, field));
    }

    /// Register an uncapped `terms` aggregation under `name`
    pub fn term_aggs(&mut self, name: impl Into<String>, field: impl Into<String>) {
        self.aggs.insert(name.into(), Aggregation::terms(field));
    }

    /// Register a histogram splitting `[min, max]` into `num_bins` intervals
    ///
    /// A zero-width interval (`min == max`) registers nothing. The offset is
    /// `min` exactly as given, so integer bounds render as integers.
    pub fn hist_aggs<B>(
        &mut self,
        name: impl Into<String>,
        field: impl Into<String>,
        min: B,
        max: B,
        num_bins: u32,
    ) -> Result<()>
    where
        B: Copy + Into<f64> + Into<Value>,
    {
        let name = name.into();
        let offset: Value = min.into();
        let min: f64 = min.into();
        let max: f64 = max.into();
        if num_bins == 0 {
            return Err(QueryError::InvalidHistogram {
                name,
                reason: "bin count must be positive".to_string(),
            });
        }

        let interval = (max - min) / f64::from(num_bins);
        if !interval.is_finite() {
            return Err(QueryError::InvalidHistogram {
                name,
                reason: format!("bounds [{}, {}] give a non-finite interval", min, max),
            });
        }
        if interval == 0.0 {
            debug!("Skipping histogram '{}': zero interval for bounds [{}, {}]", name, min, max);
            return Ok(());
        }

        self.aggs
            .insert(name, Aggregation::histogram(field, interval, offset));
        Ok(())
    }

    /// Consolidate all registered aggregations into one composite aggregation
    ///
    /// `terms` aggregations become sources and everything else becomes a
    /// per-bucket sub-aggregation. When `drop_na` is false, sources also emit a
    /// bucket for documents missing the field.
    pub fn composite_agg(&mut self, name: impl Into<String>, size: u64, drop_na: bool) {
        let mut sources = Vec::new();
        let mut aggregations = IndexMap::new();

        let missing_bucket = (!drop_na).then(|| self.settings.missing_bucket_value.clone());

        for (agg_name, agg) in std::mem::take(&mut self.aggs) {
            if agg.is_terms() {
                sources.push((agg_name, agg.into_source(missing_bucket.clone())));
            } else {
                aggregations.insert(agg_name, agg);
            }
        }

        let name = name.into();
        debug!(
            "Built composite '{}' with {} sources and {} sub-aggregations",
            name,
            sources.len(),
            aggregations.len()
        );

        self.aggs.insert(
            name,
            Aggregation::Composite(CompositeAggregation {
                size,
                sources,
                after: None,
                aggregations,
            }),
        );
    }

    /// Attach the cursor from a previous page to the composite aggregation `name`
    pub fn composite_agg_after_key(
        &mut self,
        name: &str,
        after_key: Map<String, Value>,
    ) -> Result<()> {
        let agg = self
            .aggs
            .get_mut(name)
            .ok_or_else(|| QueryError::AggregationNotFound(name.to_string()))?;
        let composite = agg
            .as_composite_mut()
            .ok_or_else(|| QueryError::NotComposite(name.to_string()))?;
        composite.after = Some(after_key);
        Ok(())
    }

    /// Render the body for a search request
    pub fn to_search_body(&self) -> Value {
        let mut body = Map::new();
        if !self.aggs.is_empty() {
            body.insert("aggs".to_string(), render_map(&self.aggs));
        }
        if !self.filter.is_empty() {
            body.insert("query".to_string(), self.filter.build());
        }
        Value::Object(body)
    }

    /// Render the body for a count request, or `None` when there is no filter
    ///
    /// Aggregations are not part of a count body; registering any is reported
    /// as a warning.
    pub fn to_count_body(&self) -> Option<Value> {
        if !self.aggs.is_empty() && self.settings.warn_on_aggregation_count {
            warn!("Requesting count for agg query {}", self);
        }
        if self.filter.is_empty() {
            return None;
        }

        let mut body = Map::new();
        body.insert("query".to_string(), self.filter.build());
        Some(Value::Object(body))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_search_body())
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_search_body().serialize(serializer)
    }
}
