//! Error types for reprise-scan's HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::scan::ScanError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - scan capacity reached
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Service misconfigured, e.g. missing credential (500)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// reprise-common error
    #[error("Common error: {0}")]
    Common(#[from] reprise_common::Error),
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ScanError::Busy { .. } => ApiError::Conflict(err.to_string()),
            ScanError::NotFound(id) => ApiError::NotFound(format!("Scan job not found: {}", id)),
            ScanError::Configuration(e) => ApiError::Configuration(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                msg,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationError;

    #[test]
    fn test_scan_error_mapping() {
        let cases = [
            (ScanError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ScanError::Busy { running: 1 }, StatusCode::CONFLICT),
            (ScanError::NotFound(uuid::Uuid::nil()), StatusCode::NOT_FOUND),
            (
                ScanError::Configuration(ConfigurationError::MissingCredential("key".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ScanError::EmptyFingerprint, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
