use thiserror::Error;

/// Main error type for query building operations
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Aggregation not found: {0}")]
    AggregationNotFound(String),

    #[error("Aggregation '{0}' is not a composite aggregation")]
    NotComposite(String),

    #[error("Invalid histogram '{name}': {reason}")]
    InvalidHistogram { name: String, reason: String },
}

/// Result type alias for query building operations
pub type Result<T> = std::result::Result<T, QueryError>;
