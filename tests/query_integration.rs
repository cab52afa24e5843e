//! Integration tests for request body building
//!
//! Tests end-to-end body rendering from builder calls through to JSON.

use querybody::query::BooleanFilter;
use querybody::{Query, QueryError, QuerySettings};
use serde_json::{json, Map, Value};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Captures formatted log output in memory
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn setup_composite_query() -> Query {
    let mut query = Query::new();
    query.term_aggs("color", "color");
    query.metric_aggs("avg_price", "avg", "price");
    query.composite_agg("bucket", 5, true);
    query
}

#[test]
fn test_fresh_builder() {
    let query = Query::new();
    assert_eq!(query.to_search_body(), json!({}));
    assert_eq!(query.to_count_body(), None);
}

#[test]
fn test_exists_is_mutually_exclusive() {
    let mut present = Query::new();
    present.exists("Carrier", true);
    let mut absent = Query::new();
    absent.exists("Carrier", false);

    let present_body = present.to_search_body();
    let absent_body = absent.to_search_body();
    assert_eq!(present_body["query"], json!({ "exists": { "field": "Carrier" } }));
    assert_eq!(
        absent_body["query"],
        json!({ "bool": { "must_not": present_body["query"].clone() } })
    );
}

#[test]
fn test_negated_terms_negates_whole_set() {
    let mut query = Query::new();
    query.terms("status", ["a", "b"], false);
    assert_eq!(
        query.to_search_body(),
        json!({ "query": { "bool": { "must_not": { "terms": { "status": ["a", "b"] } } } } })
    );
}

#[test]
fn test_zero_width_histogram_registers_nothing() {
    let mut query = Query::new();
    query.metric_aggs("max_price", "max", "price");
    let before = query.clone();
    query.hist_aggs("h", "price", 0.0, 0.0, 10).unwrap();
    assert_eq!(query, before);
}

#[test]
fn test_composite_consolidation() {
    let query = setup_composite_query();
    let body = query.to_search_body();

    assert_eq!(
        body,
        json!({
            "aggs": {
                "bucket": {
                    "composite": {
                        "size": 5,
                        "sources": [{ "color": { "terms": { "field": "color" } } }]
                    },
                    "aggregations": { "avg_price": { "avg": { "field": "price" } } }
                }
            }
        })
    );
    let aggs = body["aggs"].as_object().unwrap();
    assert_eq!(aggs.len(), 1);
    assert!(aggs.get("color").is_none());
    assert!(aggs.get("avg_price").is_none());
}

#[test]
fn test_composite_keeps_source_order_and_sizes() {
    let mut query = Query::new();
    query.terms_aggs("carrier", "terms", "Carrier", 10);
    query.metric_aggs("max_delay", "max", "FlightDelayMin");
    query.term_aggs("dest", "Dest");
    query.composite_agg("groupby_buckets", 100, false);

    let body = query.to_search_body();
    assert_eq!(
        body["aggs"]["groupby_buckets"]["composite"]["sources"],
        json!([
            { "carrier": { "terms": { "field": "Carrier", "size": 10, "missing_bucket": "true" } } },
            { "dest": { "terms": { "field": "Dest", "missing_bucket": "true" } } }
        ])
    );
}

#[test]
fn test_after_key_pagination() {
    let mut query = setup_composite_query();
    query
        .composite_agg_after_key("bucket", object(json!({ "color": "red" })))
        .unwrap();

    let body = query.to_search_body();
    assert_eq!(
        body["aggs"]["bucket"]["composite"]["after"],
        json!({ "color": "red" })
    );

    // Next page replaces the cursor
    query
        .composite_agg_after_key("bucket", object(json!({ "color": "teal" })))
        .unwrap();
    assert_eq!(
        query.to_search_body()["aggs"]["bucket"]["composite"]["after"],
        json!({ "color": "teal" })
    );
}

#[test]
fn test_after_key_requires_composite() {
    let mut query = Query::new();
    query.metric_aggs("avg_price", "avg", "price");

    let err = query
        .composite_agg_after_key("avg_price", object(json!({ "a": 1 })))
        .unwrap_err();
    assert!(matches!(err, QueryError::NotComposite(_)));

    let err = query
        .composite_agg_after_key("missing", object(json!({ "a": 1 })))
        .unwrap_err();
    assert!(matches!(err, QueryError::AggregationNotFound(_)));
}

#[test]
fn test_copy_independence() {
    let mut original = Query::new();
    original.exists("Carrier", true);
    original.term_aggs("color", "color");
    let original_body = original.to_search_body();

    let mut copy = Query::copy_of(&original);
    copy.terms("Dest", ["Rome"], true);
    copy.metric_aggs("avg_price", "avg", "price");
    copy.composite_agg("bucket", 5, false);
    copy.random_score(3);

    assert_eq!(original.to_search_body(), original_body);

    original.regexp("Origin", "Fr.*");
    let copy_body = copy.to_search_body();
    assert!(copy_body["aggs"].get("bucket").is_some());
    assert!(copy_body["query"].get("function_score").is_some());
    assert!(!copy_body.to_string().contains("Origin"));
}

#[test]
fn test_search_body_with_filter_and_aggs() {
    let mut query = Query::new();
    query.exists("Carrier", true);
    query.regexp("Dest", "Ro.*");
    query.terms_aggs("carriers", "terms", "Carrier", 10);
    query.hist_aggs("prices", "AvgTicketPrice", 100.0, 1100.0, 10).unwrap();

    assert_eq!(
        query.to_search_body(),
        json!({
            "aggs": {
                "carriers": { "terms": { "field": "Carrier", "size": 10 } },
                "prices": { "histogram": {
                    "field": "AvgTicketPrice", "interval": 100.0, "offset": 100.0
                } }
            },
            "query": { "bool": { "must": [
                { "exists": { "field": "Carrier" } },
                { "regexp": { "Dest": "Ro.*" } }
            ] } }
        })
    );
}

#[test]
fn test_count_body_with_aggregations_warns() {
    let mut query = Query::new();
    query.exists("Carrier", true);
    query.metric_aggs("avg_price", "avg", "price");

    let (body, logs) = with_captured_logs(|| query.to_count_body());
    assert_eq!(
        body,
        Some(json!({ "query": { "exists": { "field": "Carrier" } } }))
    );
    assert!(logs.contains("WARN"));
    assert!(logs.contains("Requesting count for agg query"));
}

#[test]
fn test_count_body_without_aggregations_is_quiet() {
    let mut query = Query::new();
    query.exists("Carrier", true);

    let (body, logs) = with_captured_logs(|| query.to_count_body());
    assert!(body.is_some());
    assert!(logs.is_empty());
}

#[test]
fn test_count_warning_can_be_disabled() {
    let settings = QuerySettings::default().with_aggregation_count_warning(false);
    let mut query = Query::with_settings(settings);
    query.metric_aggs("avg_price", "avg", "price");

    let (body, logs) = with_captured_logs(|| query.to_count_body());
    assert_eq!(body, None);
    assert!(logs.is_empty());
}

#[test]
fn test_random_score_sampling() {
    let mut query = Query::new();
    query.random_score(42);
    assert_eq!(
        query.to_count_body(),
        Some(json!({ "query": { "function_score": {
            "query": { "match_all": {} },
            "random_score": { "seed": 42, "field": "_seq_no" }
        } } }))
    );
}

#[test]
fn test_update_boolean_filter_with_prebuilt_tree() {
    let mut query = Query::new();
    query.exists("Carrier", true);
    query.update_boolean_filter(
        BooleanFilter::greater_equal("AvgTicketPrice", 100) | BooleanFilter::equal("Cancelled", true),
    );

    assert_eq!(
        query.to_search_body()["query"]["bool"]["must"][1],
        json!({ "bool": { "should": [
            { "range": { "AvgTicketPrice": { "gte": 100 } } },
            { "term": { "Cancelled": true } }
        ] } })
    );
}

#[test]
fn test_serialize_matches_search_body() {
    let query = setup_composite_query();
    assert_eq!(serde_json::to_value(&query).unwrap(), query.to_search_body());
}
