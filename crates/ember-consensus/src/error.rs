//! Error types for consensus operations.

use thiserror::Error;

/// Consensus and configuration errors.
#[derive(Error, Debug)]
pub enum ConsensusError {
    /// Reading a config manifest failed.
    #[error("config read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a config manifest or serialized structure.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A timestamp string was not valid RFC 3339.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
