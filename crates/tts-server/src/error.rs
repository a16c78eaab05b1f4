//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tts_core::TtsError;

/// Error returned by HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Synthesis or validation failure.
    #[error(transparent)]
    Synthesis(#[from] TtsError),

    /// Malformed request body or parameters.
    #[error("{0}")]
    BadRequest(String),

    /// Requested file does not exist in scratch storage.
    #[error("file not found")]
    NotFound,

    /// Unexpected server-side failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Synthesis(TtsError::Busy) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Synthesis(TtsError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Synthesis(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Synthesis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
