//! Error types for the opsboard tools.

use thiserror::Error;

/// Errors that can occur in opsboard operations.
#[derive(Error, Debug)]
pub enum OpsboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("No item with id '{id}' in '{collection}'")]
    NotFound { collection: &'static str, id: String },

    #[error("Version conflict on '{collection}': submitted {submitted}, current {current}")]
    VersionConflict {
        collection: &'static str,
        submitted: u64,
        current: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for opsboard operations.
pub type OpsboardResult<T> = Result<T, OpsboardError>;
