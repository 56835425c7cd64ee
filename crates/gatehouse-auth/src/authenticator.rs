//! End-to-end authorization decisions for inbound signed requests.
//!
//! Orchestrates the directory client and the signature verifier into one
//! fail-closed decision per request. The only persistent state is the
//! directory snapshot, which this component reads but never mutates
//! directly; everything else is per-call.

use gatehouse_core::{AuthDecision, KeyRecord, RejectReason, SignedRequest, VerifyStrategy};
use tracing::{debug, instrument, warn};

use crate::directory::KeyDirectoryClient;
use crate::error::Result;
use crate::verify::{self, VerifyFailure};

/// Produces an authorization decision for one inbound request.
///
/// # Refresh policy
///
/// Key rotation can introduce identifiers between fetches, so a miss on
/// the current snapshot triggers exactly one directory refresh before the
/// identifier is declared unknown. The refresh is bounded, never a retry
/// loop, and missing credentials are rejected before any network call.
#[derive(Clone)]
pub struct RequestAuthenticator {
    directory: KeyDirectoryClient,
    strategy: VerifyStrategy,
}

impl RequestAuthenticator {
    /// Creates an authenticator over a directory client with the
    /// configured verification strategy.
    pub fn new(directory: KeyDirectoryClient, strategy: VerifyStrategy) -> Self {
        Self { directory, strategy }
    }

    /// Returns the configured verification strategy.
    pub fn strategy(&self) -> VerifyStrategy {
        self.strategy
    }

    /// Authorizes one signed request.
    ///
    /// Every failure mode, absent credentials, an unknown or rotated-out
    /// key, an unreachable directory, a bad signature, collapses to a
    /// rejection with a distinct reason; nothing here returns an error or
    /// panics on caller-controlled input.
    #[instrument(name = "authorize", skip(self, request), fields(key_id = %request.key_identifier, strategy = %self.strategy))]
    pub async fn authorize(&self, request: SignedRequest<'_>) -> AuthDecision {
        if request.signature.trim().is_empty() || request.key_identifier.trim().is_empty() {
            debug!("rejecting request with missing credentials");
            return AuthDecision::reject(RejectReason::MissingCredentials);
        }

        let record = match self.resolve_with_one_refresh(request.key_identifier).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("key identifier unknown after refresh");
                return AuthDecision::reject(RejectReason::UnknownKey);
            },
            Err(err) => {
                warn!(error = %err, "key directory unavailable, failing closed");
                return AuthDecision::reject(RejectReason::DirectoryUnavailable);
            },
        };

        match verify::check(request.raw_body, request.signature, &record.material, self.strategy) {
            Ok(()) => AuthDecision::allow(),
            Err(VerifyFailure::MalformedKey) => {
                warn!("resolved key material is unusable for the configured strategy");
                AuthDecision::reject(RejectReason::MalformedKeyMaterial)
            },
            Err(_) => {
                debug!("signature verification failed");
                AuthDecision::reject(RejectReason::InvalidSignature)
            },
        }
    }

    /// Resolves a key identifier, refreshing the directory at most once on
    /// a miss.
    async fn resolve_with_one_refresh(&self, key_identifier: &str) -> Result<Option<KeyRecord>> {
        if let Some(record) = self.directory.resolve(key_identifier).await {
            return Ok(Some(record));
        }

        let observed = self.directory.snapshot().await.generation;
        self.directory.refresh(observed).await?;

        Ok(self.directory.resolve(key_identifier).await)
    }
}
