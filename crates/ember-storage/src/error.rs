//! Storage error types.

use thiserror::Error;

/// Errors from the persistence layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// A named bucket is missing from the database.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// A stored value failed to decode.
    #[error("corrupt value for key {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
