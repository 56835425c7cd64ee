//! Error types for key directory operations.
//!
//! The directory client reports distinct outcomes rather than collapsing
//! them early: a "not modified" response is a success, and only genuine
//! fetch failures become errors. The request authenticator is the single
//! place that converts these into an authorization decision.

use thiserror::Error;

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Failures reaching or reading the remote key directory.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// Network-level failure contacting the directory endpoint.
    #[error("key directory unreachable: {message}")]
    Unreachable {
        /// Description of the transport failure.
        message: String,
    },

    /// The directory answered with a non-success, non-304 status.
    #[error("key directory returned HTTP {status}")]
    BadStatus {
        /// HTTP status code returned by the directory.
        status: u16,
    },

    /// The directory response body could not be decoded.
    #[error("key directory response malformed: {message}")]
    MalformedResponse {
        /// Description of the decode failure.
        message: String,
    },
}

impl DirectoryError {
    /// Creates an unreachable error from a transport failure message.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable { message: message.into() }
    }

    /// Creates a bad-status error from an HTTP status code.
    pub fn bad_status(status: u16) -> Self {
        Self::BadStatus { status }
    }

    /// Creates a malformed-response error from a decode failure message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse { message: message.into() }
    }
}
