//! Request authentication core for the Gatehouse webhook gateway.
//!
//! This crate decides whether an inbound request was signed by a key the
//! remote directory currently publishes. It is built from three pieces:
//!
//! 1. **Key directory client** - fetches and caches the published key set
//!    with conditional revalidation, replacing the cache snapshot atomically
//!    on change and leaving it untouched on "not modified" or failure.
//! 2. **Signature verifier** - checks a detached signature against resolved
//!    key material using one of two configured strategies (ECDSA P-256 over
//!    SHA-256, or HMAC-SHA-256 with constant-time comparison).
//! 3. **Request authenticator** - orchestrates the two into a single
//!    fail-closed authorization decision per request, refreshing the
//!    directory at most once when a key identifier is missing from the
//!    current snapshot.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use gatehouse_auth::{
//!     DirectoryConfig, HttpDirectorySource, KeyDirectoryClient, RequestAuthenticator,
//! };
//! use gatehouse_core::{SignedRequest, VerifyStrategy};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = HttpDirectorySource::new(DirectoryConfig {
//!     url: "https://keys.example.com/public_keys".into(),
//!     bearer_token: None,
//!     timeout: Duration::from_secs(10),
//! })?;
//! let directory = KeyDirectoryClient::new(Arc::new(source));
//! let authenticator = RequestAuthenticator::new(directory, VerifyStrategy::EcdsaP256);
//!
//! let decision = authenticator
//!     .authorize(SignedRequest {
//!         raw_body: b"payload",
//!         signature: "MEUCIQ...",
//!         key_identifier: "kid-2024-001",
//!     })
//!     .await;
//! assert!(!decision.authorized || decision.reason.is_none());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod directory;
pub mod error;
pub mod verify;

pub use authenticator::RequestAuthenticator;
pub use directory::{
    DirectoryConfig, DirectorySource, FetchOutcome, HttpDirectorySource, KeyDirectoryClient,
    RefreshOutcome,
};
pub use error::{DirectoryError, Result};
pub use verify::{check, verify, VerifyFailure};
