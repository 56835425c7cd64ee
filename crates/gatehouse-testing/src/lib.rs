//! Test doubles and signing helpers for Gatehouse.
//!
//! Provides the pieces tests need to exercise the authentication core
//! without a real key directory or signer:
//!
//! - [`MockDirectorySource`]: in-memory directory double with call
//!   counting, scripted rotation, and injectable failures.
//! - [`FakeKeyDirectory`]: wiremock-backed HTTP directory serving real
//!   conditional-request semantics (ETag / If-None-Match / 304).
//! - [`TestSigner`] and [`hmac_signature`]: genuine signers producing the
//!   wire encodings the gateway verifies.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
pub mod signing;

pub use directory::{FakeKeyDirectory, MockDirectorySource};
pub use signing::{hmac_signature, TestSigner};
