//! Key directory client with conditional revalidation and snapshot caching.
//!
//! Maintains an up-to-date, minimally refetched view of the remote key
//! directory. The cache is a single immutable [`KeySetSnapshot`] behind an
//! `Arc`: readers take the current snapshot without blocking, and a refresh
//! either replaces the whole snapshot or leaves it untouched. There are no
//! background refresh tasks; a refresh happens only when the authenticator
//! misses on a key identifier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_core::{KeyRecord, KeySetSnapshot};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::error::{DirectoryError, Result};

/// Outcome of a single directory fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The directory returned a fresh key set.
    Fresh {
        /// Revalidation token (ETag) to present on the next fetch.
        revalidation_token: Option<String>,
        /// The complete published key set.
        records: Vec<KeyRecord>,
    },
    /// The directory confirmed the cached key set is still current.
    NotModified,
}

/// Outcome of a [`KeyDirectoryClient::refresh`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh key set was fetched and the snapshot replaced.
    Fetched,
    /// The directory confirmed the snapshot is current; nothing changed.
    NotModified,
    /// Another caller refreshed first; the snapshot already moved past the
    /// generation this caller observed, so no fetch was performed.
    Coalesced,
}

/// The fetch seam between the cache and the remote directory.
///
/// Production uses [`HttpDirectorySource`]; tests substitute in-memory
/// doubles to control rotation, failures, and call counts.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetches the current key set, optionally presenting the last known
    /// revalidation token so the directory can answer "not modified".
    async fn fetch(&self, revalidation_token: Option<&str>) -> Result<FetchOutcome>;
}

/// Configuration for the HTTP directory source.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Well-known directory endpoint URL.
    pub url: String,
    /// Optional bearer credential for higher rate limits. Absence is not
    /// an error; the fetch simply goes unauthenticated.
    pub bearer_token: Option<String>,
    /// Bound on the directory fetch; the only blocking work in this core.
    pub timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { url: String::new(), bearer_token: None, timeout: Duration::from_secs(10) }
    }
}

/// JSON document published by the directory endpoint.
#[derive(Debug, Deserialize)]
struct DirectoryDocument {
    public_keys: Vec<KeyRecord>,
}

/// Fetches the key directory over HTTP with conditional requests.
///
/// Sends `If-None-Match` with the cached revalidation token and reads the
/// replacement token from the `ETag` response header. A 304 is a defined,
/// non-error outcome; any other non-2xx status or transport failure is
/// reported as a distinct [`DirectoryError`].
#[derive(Debug, Clone)]
pub struct HttpDirectorySource {
    client: reqwest::Client,
    config: DirectoryConfig,
}

impl HttpDirectorySource {
    /// Creates an HTTP source with its own bounded-timeout client.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Unreachable`] if the HTTP client cannot be
    /// built with the configured timeout.
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DirectoryError::unreachable(format!("failed to build client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates an HTTP source reusing an existing client.
    pub fn with_client(client: reqwest::Client, config: DirectoryConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl DirectorySource for HttpDirectorySource {
    #[instrument(name = "directory_fetch", skip(self), fields(url = %self.config.url))]
    async fn fetch(&self, revalidation_token: Option<&str>) -> Result<FetchOutcome> {
        let mut request = self.client.get(&self.config.url);

        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(etag) = revalidation_token {
            request = request.header(header::IF_NONE_MATCH, etag);
        }

        let response =
            request.send().await.map_err(|e| DirectoryError::unreachable(e.to_string()))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("directory not modified");
            return Ok(FetchOutcome::NotModified);
        }
        if !response.status().is_success() {
            return Err(DirectoryError::bad_status(response.status().as_u16()));
        }

        let revalidation_token = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let document: DirectoryDocument =
            response.json().await.map_err(|e| DirectoryError::malformed(e.to_string()))?;

        debug!(keys = document.public_keys.len(), "directory fetched fresh key set");
        Ok(FetchOutcome::Fresh { revalidation_token, records: document.public_keys })
    }
}

/// Caching client over a [`DirectorySource`].
///
/// The snapshot is the only shared mutable state in the authentication
/// core. Lookups clone the current `Arc` under a read lock and proceed
/// without further coordination; replacement writes a whole new snapshot
/// under the write lock, so no reader ever observes a half-updated key
/// set. A dedicated refresh mutex serializes fetches, and the snapshot
/// generation lets callers that lost the race skip a redundant fetch.
///
/// Cancellation is safe by construction: a fetch result is applied only
/// after the fetch completes, so an abandoned in-flight fetch leaves the
/// existing snapshot in place.
#[derive(Clone)]
pub struct KeyDirectoryClient {
    source: Arc<dyn DirectorySource>,
    snapshot: Arc<RwLock<Arc<KeySetSnapshot>>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl KeyDirectoryClient {
    /// Creates a client with an empty initial cache.
    ///
    /// The cache stays empty until the first refresh, which the
    /// authenticator triggers on its first unresolved identifier.
    pub fn new(source: Arc<dyn DirectorySource>) -> Self {
        Self {
            source,
            snapshot: Arc::new(RwLock::new(Arc::new(KeySetSnapshot::default()))),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the current cache snapshot.
    pub async fn snapshot(&self) -> Arc<KeySetSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Resolves a key identifier against the current snapshot.
    ///
    /// This is a pure lookup; it never triggers a fetch. The caller decides
    /// refresh policy, at most one refresh per authorization on a miss.
    pub async fn resolve(&self, key_identifier: &str) -> Option<KeyRecord> {
        self.snapshot.read().await.find(key_identifier).cloned()
    }

    /// Refreshes the cache from the directory, at most once per observed
    /// generation.
    ///
    /// `observed_generation` is the snapshot generation the caller saw when
    /// it decided to refresh. If the snapshot has already moved past it,
    /// another caller's refresh landed in the meantime and this call
    /// returns [`RefreshOutcome::Coalesced`] without touching the network.
    ///
    /// On a fresh fetch the snapshot is replaced atomically; on "not
    /// modified" or any error the existing snapshot is left untouched.
    ///
    /// # Errors
    ///
    /// Propagates the [`DirectoryError`] from the fetch. The cache never
    /// silently falls back to a stale or empty state on failure; the caller
    /// must fail closed.
    #[instrument(name = "directory_refresh", skip(self))]
    pub async fn refresh(&self, observed_generation: u64) -> Result<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.snapshot.read().await.clone();
        if current.generation != observed_generation {
            debug!(
                observed = observed_generation,
                current = current.generation,
                "refresh coalesced with a concurrent fetch"
            );
            return Ok(RefreshOutcome::Coalesced);
        }

        match self.source.fetch(current.revalidation_token.as_deref()).await? {
            FetchOutcome::Fresh { revalidation_token, records } => {
                let next = Arc::new(KeySetSnapshot {
                    revalidation_token,
                    records,
                    generation: current.generation + 1,
                });
                *self.snapshot.write().await = next;
                debug!(generation = current.generation + 1, "snapshot replaced");
                Ok(RefreshOutcome::Fetched)
            },
            FetchOutcome::NotModified => Ok(RefreshOutcome::NotModified),
        }
    }
}
