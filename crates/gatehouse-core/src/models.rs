//! Domain models for request authentication.
//!
//! Defines the key directory records and cache snapshots owned by the
//! directory client, the transient per-request view of a signed inbound
//! request, and the authorization decision produced for each one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single published signing key from the remote key directory.
///
/// Immutable once fetched. `material` is a PEM-encoded public key for the
/// asymmetric strategy, or the shared secret for the symmetric strategy;
/// the directory wire format uses the `key_identifier` / `key` field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Opaque identifier the caller presents to select this key.
    #[serde(rename = "key_identifier")]
    pub identifier: String,
    /// Opaque key material (PEM public key or shared secret).
    #[serde(rename = "key")]
    pub material: String,
}

/// One immutable generation of the key directory cache.
///
/// Owned by the directory client and shared behind an `Arc`; a refresh
/// either replaces the whole snapshot or leaves it untouched. Readers
/// holding an older generation keep a consistent view for the duration
/// of their request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeySetSnapshot {
    /// Opaque revalidation token (an ETag) from the last successful fetch.
    pub revalidation_token: Option<String>,
    /// Published key records, in directory order.
    pub records: Vec<KeyRecord>,
    /// Monotonic fetch generation, starting at zero for the empty cache.
    pub generation: u64,
}

impl KeySetSnapshot {
    /// Looks up a key record by identifier.
    ///
    /// Duplicate identifiers within one snapshot resolve to the first
    /// occurrence, matching directory publication order.
    pub fn find(&self, key_identifier: &str) -> Option<&KeyRecord> {
        self.records.iter().find(|record| record.identifier == key_identifier)
    }

    /// Returns true if the snapshot has never been populated by a fetch.
    pub fn is_initial(&self) -> bool {
        self.generation == 0
    }
}

/// Per-request view of the credentials attached to an inbound request.
///
/// Borrowed from the HTTP request and never persisted. The signature is a
/// base64-encoded detached signature over exactly `raw_body`.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    /// Raw request body bytes, exactly as received.
    pub raw_body: &'a [u8],
    /// Base64-encoded detached signature header value.
    pub signature: &'a str,
    /// Key identifier header value.
    pub key_identifier: &'a str,
}

/// Signature verification strategy, selected at configuration time.
///
/// The two strategies imply materially different trust models: ECDSA
/// verifies against a published public key, HMAC against a shared secret.
/// A deployment picks exactly one; they are never mixed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyStrategy {
    /// DER-encoded ECDSA P-256 signature over the SHA-256 digest of the body.
    EcdsaP256,
    /// Base64-encoded HMAC-SHA-256 digest of the body, keyed by a shared secret.
    HmacSha256,
}

impl fmt::Display for VerifyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EcdsaP256 => write!(f, "ecdsa-p256"),
            Self::HmacSha256 => write!(f, "hmac-sha256"),
        }
    }
}

/// Why an inbound request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Signature or key identifier header missing or empty.
    MissingCredentials,
    /// Key identifier not present in the directory, even after one refresh.
    UnknownKey,
    /// Signature did not verify against the resolved key.
    InvalidSignature,
    /// The key directory could not be reached or returned an error.
    DirectoryUnavailable,
    /// The resolved key material could not be parsed for the configured strategy.
    MalformedKeyMaterial,
}

impl RejectReason {
    /// Whether the rejection reflects a gateway dependency failure rather
    /// than a caller fault. Dependency failures may surface as retryable
    /// 5xx responses; everything else is a plain 403.
    pub const fn is_dependency_failure(&self) -> bool {
        matches!(self, Self::DirectoryUnavailable)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "missing signature or key identifier"),
            Self::UnknownKey => write!(f, "no published key matches the key identifier"),
            Self::InvalidSignature => write!(f, "signature verification failed"),
            Self::DirectoryUnavailable => write!(f, "key directory unavailable"),
            Self::MalformedKeyMaterial => write!(f, "key material could not be parsed"),
        }
    }
}

/// Authorization decision for one inbound request.
///
/// Produced once per request and immutable. `reason` is always present
/// when `authorized` is false and never present when it is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthDecision {
    /// Whether the request may proceed.
    pub authorized: bool,
    /// Rejection reason, set iff the request was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl AuthDecision {
    /// Decision that allows the request.
    pub const fn allow() -> Self {
        Self { authorized: true, reason: None }
    }

    /// Decision that rejects the request for the given reason.
    pub const fn reject(reason: RejectReason) -> Self {
        Self { authorized: false, reason: Some(reason) }
    }
}
