pub mod config;
pub mod error;
pub mod query;

pub use config::QuerySettings;
pub use error::{QueryError, Result};
pub use query::{Aggregation, BooleanFilter, CompositeAggregation, Query};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
