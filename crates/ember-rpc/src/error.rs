//! REST API error types.
//!
//! REST failures map to conventional status codes with an
//! `{ok: false, error}` body. JSON-RPC failures never use this path;
//! they ride back as HTTP 200 with an `error` field.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ember_chain::ChainError;
use serde_json::json;
use thiserror::Error;

/// REST API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed request data.
    #[error("{0}")]
    BadRequest(String),

    /// The requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Internal failure.
    #[error("{0}")]
    Internal(String),

    /// Admission or validation failure from the chain.
    #[error("{0}")]
    Chain(#[from] ChainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Chain(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "ok": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result type for REST handlers.
pub type ApiResult<T> = Result<T, ApiError>;
