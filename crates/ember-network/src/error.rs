//! Network error types.

use thiserror::Error;

/// Errors from the P2P layer.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing failure (oversize or malformed line).
    #[error("codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    /// Malformed message payload.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// An operation did not complete in time.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
