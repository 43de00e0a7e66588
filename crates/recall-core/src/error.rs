//! Error taxonomy for Recall.

use crate::storage::StorageError;

/// Recall errors.
#[derive(Debug, thiserror::Error)]
pub enum RecallError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid import payload: {0}")]
    InvalidImport(String),

    #[error("memory not found: {id}")]
    EntryNotFound { id: String },

    #[error("invalid configuration: {key}={value}")]
    Config { key: String, value: String },
}

/// Result type for Recall operations.
pub type Result<T> = std::result::Result<T, RecallError>;
