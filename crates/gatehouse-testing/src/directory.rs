//! Key directory test doubles.
//!
//! Two levels of fidelity: [`MockDirectorySource`] plugs straight into the
//! directory client's fetch seam for unit tests that assert call counts,
//! and [`FakeKeyDirectory`] runs a real HTTP server with conditional
//! request semantics for end-to-end tests over the wire.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use gatehouse_auth::{DirectoryError, DirectorySource, FetchOutcome};
use gatehouse_core::KeyRecord;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIRECTORY_PATH: &str = "/public_keys";

#[derive(Debug, Default)]
struct MockState {
    etag: String,
    records: Vec<KeyRecord>,
    fail_status: Option<u16>,
    fail_unreachable: bool,
}

/// In-memory [`DirectorySource`] double.
///
/// Behaves like a directory honoring conditional requests: a fetch
/// presenting the currently published ETag answers "not modified", any
/// other token gets the full key set. Tests script rotation by calling
/// [`publish`](Self::publish) with a new ETag, and failures with
/// [`fail_with_status`](Self::fail_with_status) /
/// [`fail_unreachable`](Self::fail_unreachable). Every fetch attempt is
/// counted, including failed ones.
#[derive(Debug, Default)]
pub struct MockDirectorySource {
    state: Mutex<MockState>,
    fetches: AtomicUsize,
}

impl MockDirectorySource {
    /// Creates an empty source; fetches fail until something is published.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a key set under a new revalidation token, clearing any
    /// scripted failure.
    pub fn publish(&self, etag: impl Into<String>, records: Vec<KeyRecord>) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.etag = etag.into();
        state.records = records;
        state.fail_status = None;
        state.fail_unreachable = false;
    }

    /// Makes subsequent fetches fail with the given HTTP status.
    pub fn fail_with_status(&self, status: u16) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.fail_status = Some(status);
        state.fail_unreachable = false;
    }

    /// Makes subsequent fetches fail as a transport error.
    pub fn fail_unreachable(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.fail_unreachable = true;
        state.fail_status = None;
    }

    /// Number of fetch attempts made against this source.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectorySource for MockDirectorySource {
    async fn fetch(
        &self,
        revalidation_token: Option<&str>,
    ) -> Result<FetchOutcome, DirectoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let state = self.state.lock().expect("mock state poisoned");
        if state.fail_unreachable {
            return Err(DirectoryError::unreachable("scripted transport failure"));
        }
        if let Some(status) = state.fail_status {
            return Err(DirectoryError::bad_status(status));
        }
        if state.etag.is_empty() {
            return Err(DirectoryError::bad_status(404));
        }
        if revalidation_token == Some(state.etag.as_str()) {
            return Ok(FetchOutcome::NotModified);
        }

        Ok(FetchOutcome::Fresh {
            revalidation_token: Some(state.etag.clone()),
            records: state.records.clone(),
        })
    }
}

/// HTTP fake of the remote key directory.
///
/// Serves `GET /public_keys` with the published key set, an `ETag`
/// response header, and a 304 answer for requests presenting the current
/// token via `If-None-Match`. Backed by wiremock, so tests exercise the
/// production `HttpDirectorySource` over a real socket.
pub struct FakeKeyDirectory {
    server: MockServer,
}

impl FakeKeyDirectory {
    /// Starts the fake directory on an ephemeral port.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// Full URL of the directory endpoint.
    pub fn url(&self) -> String {
        format!("{}{DIRECTORY_PATH}", self.server.uri())
    }

    /// Publishes a key set under the given ETag, replacing any previous
    /// publication or scripted failure.
    pub async fn publish(&self, etag: &str, records: &[KeyRecord]) {
        self.server.reset().await;

        let body = serde_json::json!({ "public_keys": records });

        // The conditional match must be registered first so it wins over
        // the unconditional fallback.
        Mock::given(method("GET"))
            .and(path(DIRECTORY_PATH))
            .and(header("if-none-match", etag))
            .respond_with(ResponseTemplate::new(304).insert_header("etag", etag))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(DIRECTORY_PATH))
            .respond_with(
                ResponseTemplate::new(200).insert_header("etag", etag).set_body_json(body),
            )
            .mount(&self.server)
            .await;
    }

    /// Makes the endpoint answer every request with the given status.
    pub async fn respond_with_status(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(DIRECTORY_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the directory has received.
    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.map_or(0, |requests| requests.len())
    }
}
