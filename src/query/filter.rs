//! Boolean filter predicates
//!
//! A `BooleanFilter` is an owned predicate tree that renders to the engine's
//! Query DSL. Trees are combined with `&` (AND), `|` (OR) and `!` (NOT); the
//! empty filter is the identity element for both `&` and `|`.
//!
//! # Example
//!
//! ```
//! use querybody::query::BooleanFilter;
//! use serde_json::json;
//!
//! let filter = BooleanFilter::not_null("Carrier") & !BooleanFilter::is_in("Dest", ["Rome"]);
//! assert_eq!(
//!     filter.build(),
//!     json!({
//!         "bool": {
//!             "must": [
//!                 { "exists": { "field": "Carrier" } },
//!                 { "bool": { "must_not": { "terms": { "Dest": ["Rome"] } } } }
//!             ]
//!         }
//!     })
//! );
//! ```

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::ops::{BitAnd, BitOr, Not};

/// Pseudo-field that renders an `is_in` predicate as an `ids` query
pub const IDS_FIELD: &str = "ids";

/// Comparison used by range predicates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    /// Key used inside the `range` query body
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }
}

/// Predicate tree over document fields
#[derive(Clone, Debug, Default, PartialEq)]
pub enum BooleanFilter {
    /// Identity filter; matches everything and renders nothing
    #[default]
    Empty,
    /// Explicit match-all query
    MatchAll,
    /// Field has a value
    NotNull(String),
    /// Field has no value
    IsNull(String),
    /// Field value is one of the given literals
    IsIn { field: String, values: Vec<Value> },
    /// Field matches a regular expression
    Rlike { field: String, pattern: String },
    /// Field equals a literal
    Equal { field: String, value: Value },
    /// Field compares against a bound
    Range {
        field: String,
        op: RangeOp,
        value: Value,
    },
    /// Field matches a wildcard pattern
    Like { field: String, pattern: String },
    /// Field starts with a prefix
    StartsWith { field: String, prefix: String },
    /// Inline script predicate
    Script {
        source: String,
        params: Map<String, Value>,
    },
    /// Pre-rendered query passed through untouched
    Raw(Value),
    /// All clauses must match
    And(Vec<BooleanFilter>),
    /// At least one clause should match
    Or(Vec<BooleanFilter>),
    /// Clause must not match
    Not(Box<BooleanFilter>),
    /// Deterministic random ordering of the wrapped query's matches
    RandomScore {
        query: Box<BooleanFilter>,
        seed: Option<i64>,
        field: String,
    },
}

impl BooleanFilter {
    /// Create a match-all filter
    pub fn match_all() -> Self {
        BooleanFilter::MatchAll
    }

    /// Create a "field exists" filter
    pub fn not_null(field: impl Into<String>) -> Self {
        BooleanFilter::NotNull(field.into())
    }

    /// Create a "field is missing" filter
    pub fn is_null(field: impl Into<String>) -> Self {
        BooleanFilter::IsNull(field.into())
    }

    /// Create a set membership filter
    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        BooleanFilter::IsIn {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a regular expression filter
    pub fn rlike(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        BooleanFilter::Rlike {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Create an exact term filter
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        BooleanFilter::Equal {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a range filter
    pub fn range(field: impl Into<String>, op: RangeOp, value: impl Into<Value>) -> Self {
        BooleanFilter::Range {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn greater(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::range(field, RangeOp::Gt, value)
    }

    pub fn greater_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::range(field, RangeOp::Gte, value)
    }

    pub fn less(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::range(field, RangeOp::Lt, value)
    }

    pub fn less_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::range(field, RangeOp::Lte, value)
    }

    /// Create a wildcard filter
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        BooleanFilter::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Create a prefix filter
    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        BooleanFilter::StartsWith {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    /// Create a script filter
    pub fn script(source: impl Into<String>, params: Map<String, Value>) -> Self {
        BooleanFilter::Script {
            source: source.into(),
            params,
        }
    }

    /// Wrap an already rendered query
    pub fn raw(query: Value) -> Self {
        BooleanFilter::Raw(query)
    }

    /// Wrap `query` in a seeded random score
    ///
    /// The wrapper does not change which documents match, only their order.
    pub fn random_score(query: BooleanFilter, seed: Option<i64>, field: impl Into<String>) -> Self {
        BooleanFilter::RandomScore {
            query: Box::new(query),
            seed,
            field: field.into(),
        }
    }

    /// Whether this is the identity filter
    pub fn is_empty(&self) -> bool {
        match self {
            BooleanFilter::Empty => true,
            BooleanFilter::Raw(Value::Object(map)) => map.is_empty(),
            BooleanFilter::Raw(Value::Null) => true,
            _ => false,
        }
    }

    /// Render this predicate as Query DSL JSON
    pub fn build(&self) -> Value {
        match self {
            BooleanFilter::Empty => Value::Object(Map::new()),
            BooleanFilter::MatchAll => json!({ "match_all": {} }),
            BooleanFilter::NotNull(field) => json!({ "exists": { "field": field } }),
            BooleanFilter::IsNull(field) => {
                json!({ "bool": { "must_not": { "exists": { "field": field } } } })
            }
            BooleanFilter::IsIn { field, values } => {
                if field == IDS_FIELD {
                    json!({ "ids": { "values": values } })
                } else {
                    json!({ "terms": { field.as_str(): values } })
                }
            }
            BooleanFilter::Rlike { field, pattern } => {
                json!({ "regexp": { field.as_str(): pattern } })
            }
            BooleanFilter::Equal { field, value } => json!({ "term": { field.as_str(): value } }),
            BooleanFilter::Range { field, op, value } => {
                json!({ "range": { field.as_str(): { op.as_str(): value } } })
            }
            BooleanFilter::Like { field, pattern } => {
                json!({ "wildcard": { field.as_str(): { "value": pattern } } })
            }
            BooleanFilter::StartsWith { field, prefix } => {
                json!({ "prefix": { field.as_str(): prefix } })
            }
            BooleanFilter::Script { source, params } => {
                json!({ "script": { "script": { "source": source, "params": params } } })
            }
            BooleanFilter::Raw(query) => query.clone(),
            BooleanFilter::And(clauses) => {
                let must: Vec<Value> = clauses.iter().map(BooleanFilter::build).collect();
                json!({ "bool": { "must": must } })
            }
            BooleanFilter::Or(clauses) => {
                let should: Vec<Value> = clauses.iter().map(BooleanFilter::build).collect();
                json!({ "bool": { "should": should } })
            }
            BooleanFilter::Not(inner) => json!({ "bool": { "must_not": inner.build() } }),
            BooleanFilter::RandomScore { query, seed, field } => {
                let inner = if query.is_empty() {
                    BooleanFilter::MatchAll.build()
                } else {
                    query.build()
                };
                let random_score = match seed {
                    Some(seed) => json!({ "seed": seed, "field": field }),
                    None => json!({}),
                };
                json!({ "function_score": { "query": inner, "random_score": random_score } })
            }
        }
    }
}

impl BitAnd for BooleanFilter {
    type Output = BooleanFilter;

    fn bitand(self, rhs: BooleanFilter) -> BooleanFilter {
        if self.is_empty() {
            return rhs;
        }
        if rhs.is_empty() {
            return self;
        }

        // Flatten nested conjunctions so chained `&` renders one `must` list
        match (self, rhs) {
            (BooleanFilter::And(mut left), BooleanFilter::And(right)) => {
                left.extend(right);
                BooleanFilter::And(left)
            }
            (BooleanFilter::And(mut left), right) => {
                left.push(right);
                BooleanFilter::And(left)
            }
            (left, BooleanFilter::And(mut right)) => {
                right.insert(0, left);
                BooleanFilter::And(right)
            }
            (left, right) => BooleanFilter::And(vec![left, right]),
        }
    }
}

impl BitOr for BooleanFilter {
    type Output = BooleanFilter;

    fn bitor(self, rhs: BooleanFilter) -> BooleanFilter {
        if self.is_empty() {
            return rhs;
        }
        if rhs.is_empty() {
            return self;
        }

        match (self, rhs) {
            (BooleanFilter::Or(mut left), BooleanFilter::Or(right)) => {
                left.extend(right);
                BooleanFilter::Or(left)
            }
            (BooleanFilter::Or(mut left), right) => {
                left.push(right);
                BooleanFilter::Or(left)
            }
            (left, BooleanFilter::Or(mut right)) => {
                right.insert(0, left);
                BooleanFilter::Or(right)
            }
            (left, right) => BooleanFilter::Or(vec![left, right]),
        }
    }
}

impl Not for BooleanFilter {
    type Output = BooleanFilter;

    fn not(self) -> BooleanFilter {
        BooleanFilter::Not(Box::new(self))
    }
}

impl Serialize for BooleanFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.build().serialize(serializer)
    }
}
