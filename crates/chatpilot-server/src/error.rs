//! Error types for the server.
//!
//! Only failures detected before streaming starts surface here; once the
//! event stream is open, errors travel as `error` events.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Request failed validation.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limit exceeded; retry after this many seconds.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::RateLimited { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = match &self {
            ServerError::Internal(detail) => {
                tracing::error!(status = %status, code, error = %detail, "Server error");
                // Details stay in the log.
                "An unexpected error occurred".to_string()
            }
            other => {
                let message = other.to_string();
                tracing::warn!(status = %status, code, error = %message, "Client error");
                message
            }
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };
        let mut response = (status, Json(body)).into_response();

        if let ServerError::RateLimited { retry_after_secs } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> ErrorResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_body() {
        let response = ServerError::BadRequest("Maximum 3 files allowed".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body.code, "bad_request");
        assert_eq!(body.message, "Bad request: Maximum 3 files allowed");
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = ServerError::RateLimited {
            retry_after_secs: 6,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "6");
        assert_eq!(body_of(response).await.code, "rate_limit_exceeded");
    }

    #[tokio::test]
    async fn test_internal_hides_detail() {
        let response = ServerError::Internal("db password wrong".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body.code, "internal_error");
        assert!(!body.message.contains("password"));
    }
}
