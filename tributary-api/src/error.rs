//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tributary_core::error::TributaryError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    /// Local admission limit hit.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message, "RATE_LIMITED")
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

/// Status for a non-aggregate error.
fn status_of(err: &TributaryError) -> StatusCode {
    match err {
        TributaryError::LocalRateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        TributaryError::UpstreamHttp { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        TributaryError::NotFound { .. } => StatusCode::NOT_FOUND,
        TributaryError::ExhaustedRetries { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TributaryError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        TributaryError::Validation(_) => StatusCode::BAD_REQUEST,
        TributaryError::Aggregate { cause } => status_of(cause),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TributaryError> for ApiError {
    fn from(err: TributaryError) -> Self {
        let status = status_of(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "Request failed");
        }

        match &err {
            TributaryError::LocalRateLimitExceeded => ApiError::rate_limited(err.to_string()),
            TributaryError::UpstreamHttp { .. } => {
                ApiError::new(status, err.to_string(), "UPSTREAM_ERROR")
            }
            TributaryError::NotFound { .. } => ApiError::not_found(err.to_string()),
            TributaryError::ExhaustedRetries { .. } => {
                ApiError::new(status, err.to_string(), "UPSTREAM_UNAVAILABLE")
            }
            TributaryError::InvalidResponse(_) => {
                ApiError::new(status, err.to_string(), "BAD_GATEWAY")
            }
            TributaryError::Validation(_) => ApiError::bad_request(err.to_string()),
            TributaryError::Aggregate { .. } => {
                ApiError::new(status, err.to_string(), "AGGREGATE_FAILED")
            }
            _ => ApiError::internal("An internal error occurred"),
        }
    }
}
