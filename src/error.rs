//! Error handling for the stream gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown camera id
    #[error("Camera not found: {0}")]
    NotFound(String),

    /// Camera id already registered
    #[error("Camera already exists: {0}")]
    DuplicateCamera(String),

    /// Invalid camera configuration
    #[error("Validation error: {0}")]
    Validation(String),

    /// Registry is full
    #[error("Over capacity: {0}")]
    OverCapacity(String),

    /// Inference engine unreachable or failed
    #[error("Inference error: {0}")]
    Inference(String),
}

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::DuplicateCamera(_) => (StatusCode::CONFLICT, "DUPLICATE_CAMERA"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::OverCapacity(_) => (StatusCode::SERVICE_UNAVAILABLE, "OVER_CAPACITY"),
            Error::Inference(_) => (StatusCode::BAD_GATEWAY, "INFERENCE_ERROR"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request error"
            );
        } else {
            tracing::debug!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::NotFound("cam1".into()), StatusCode::NOT_FOUND),
            (Error::DuplicateCamera("cam1".into()), StatusCode::CONFLICT),
            (Error::Validation("empty url".into()), StatusCode::BAD_REQUEST),
            (Error::OverCapacity("16".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Inference("engine down".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
