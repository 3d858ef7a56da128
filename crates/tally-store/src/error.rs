//! Error types for the tally metric store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("invalid snapshot record: {0}")]
    InvalidRecord(#[from] tally_model::ModelError),

    #[error("metric not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Whether this error is the expected miss of a `get` lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
