use serde::{Deserialize, Serialize};

/// Field used by `random_score` when none is configured
pub const DEFAULT_RANDOM_SCORE_FIELD: &str = "_seq_no";

/// Settings that shape how a `Query` renders its request bodies
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Document field the engine hashes together with the seed for random scoring
    pub random_score_field: String,
    /// Log a warning when a count body is requested while aggregations are registered
    pub warn_on_aggregation_count: bool,
    /// Value written for `missing_bucket` on composite sources that keep missing values
    pub missing_bucket_value: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            random_score_field: DEFAULT_RANDOM_SCORE_FIELD.to_string(),
            warn_on_aggregation_count: true,
            missing_bucket_value: "true".to_string(),
        }
    }
}

impl QuerySettings {
    /// Set the random score field
    pub fn with_random_score_field(mut self, field: impl Into<String>) -> Self {
        self.random_score_field = field.into();
        self
    }

    /// Enable or disable the count-with-aggregations warning
    pub fn with_aggregation_count_warning(mut self, enabled: bool) -> Self {
        self.warn_on_aggregation_count = enabled;
        self
    }
}
