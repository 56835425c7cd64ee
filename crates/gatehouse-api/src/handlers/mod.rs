//! HTTP request handlers for the Gatehouse API.
//!
//! Handlers are grouped by functionality:
//! - `health` - Readiness, liveness, and health probes
//! - `complete` - The authenticated completion relay endpoint
//!
//! All handlers return standardized error responses with an HTTP status
//! code, a stable machine-readable error code, and a human-readable
//! message. Authentication itself happens before any handler runs, in the
//! signature-checking middleware.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub mod complete;
pub mod health;

// Re-export handlers for convenient access
pub use complete::relay_completion;
pub use health::{health_check, liveness_check, readiness_check};

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable machine-readable error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Builds a standardized JSON error response.
pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail { code: code.to_string(), message: message.into() },
    };

    (status, Json(body)).into_response()
}
