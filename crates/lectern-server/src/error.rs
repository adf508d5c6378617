//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use lectern_proxy::ProxyError;

use crate::lessons::LessonSourceError;

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Proxy failure; the message is passed through unchanged.
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A collaborating service failed.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LessonSourceError> for ApiError {
    fn from(err: LessonSourceError) -> Self {
        match err {
            LessonSourceError::NotFound(id) => ApiError::NotFound(format!("lesson {}", id)),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Proxy(e) => (
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY),
                e.code(),
            ),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "bad_gateway"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
