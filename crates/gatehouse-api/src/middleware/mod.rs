//! Middleware for request authentication.

pub mod auth;

pub use auth::require_signature;
