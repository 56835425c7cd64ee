//! Streaming relay to the upstream chat-completions provider.
//!
//! Once a request is authorized, the relay opens an upstream completion
//! with `stream: true` and re-emits each upstream chunk as a server-sent
//! event, closing the stream with a literal `data: [DONE]` sentinel. The
//! relay is deliberately thin: it does not inspect chunk contents beyond
//! SSE framing, and an upstream failure before streaming starts maps to a
//! bad-gateway response rather than an authentication failure.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures::StreamExt;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn};

/// Terminal sentinel emitted after the last relayed chunk.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Buffered events between the upstream reader and the response stream.
const RELAY_CHANNEL_CAPACITY: usize = 16;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Failures opening the upstream completion.
///
/// Failures after streaming has started cannot change the response status
/// any more; they terminate the stream with the sentinel instead.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// The upstream endpoint could not be reached.
    #[error("upstream unreachable: {message}")]
    UpstreamUnreachable {
        /// Description of the transport failure.
        message: String,
    },

    /// The upstream answered with a non-success status before streaming.
    #[error("upstream returned HTTP {status}")]
    UpstreamStatus {
        /// HTTP status code returned by the upstream.
        status: u16,
    },

    /// The relay HTTP client could not be configured.
    #[error("invalid relay configuration: {message}")]
    Configuration {
        /// Configuration error message.
        message: String,
    },
}

impl RelayError {
    /// Creates an unreachable error from a transport failure message.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::UpstreamUnreachable { message: message.into() }
    }

    /// Creates a bad-status error from an HTTP status code.
    pub fn upstream_status(status: u16) -> Self {
        Self::UpstreamStatus { status }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}

/// Inbound chat payload accepted by the relay.
///
/// Only the message list matters to the gateway; unknown fields are
/// accepted and ignored so callers can carry their own metadata.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Optional conversation thread identifier, logged but not forwarded.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Conversation messages, forwarded verbatim after the system prompt.
    pub messages: Vec<serde_json::Value>,
}

/// Configuration for the streaming relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream chat-completions endpoint URL.
    pub upstream_url: String,
    /// Model name sent with every upstream request.
    pub model: String,
    /// Optional system message prepended to the conversation.
    pub system_prompt: Option<String>,
    /// Connect timeout only; a total timeout would cut streams short.
    pub connect_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_url: String::new(),
            model: "gpt-4o".to_string(),
            system_prompt: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Opens upstream completions and re-frames them as server-sent events.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    config: RelayConfig,
}

impl RelayClient {
    /// Creates a relay client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Configuration`] if the HTTP client cannot be
    /// built.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RelayError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Opens an upstream completion and returns the relayed event stream.
    ///
    /// The returned stream yields one event per upstream chunk and always
    /// terminates with the `[DONE]` sentinel, whether the upstream ended
    /// cleanly, sent its own sentinel, or failed mid-stream.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UpstreamUnreachable`] if the upstream cannot
    /// be contacted and [`RelayError::UpstreamStatus`] if it answers with a
    /// non-success status before any chunk is streamed.
    #[instrument(name = "relay_completion", skip(self, request, bearer_token), fields(model = %self.config.model, thread_id = request.thread_id.as_deref().unwrap_or("none")))]
    pub async fn stream_completion(
        &self,
        request: ChatRequest,
        bearer_token: &str,
    ) -> Result<impl futures::Stream<Item = std::result::Result<Event, Infallible>>> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(prompt) = &self.config.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": prompt }));
        }
        messages.extend(request.messages);

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        });

        let response = self
            .client
            .post(&self.config.upstream_url)
            .bearer_auth(bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::upstream_status(response.status().as_u16()));
        }

        debug!("upstream completion opened, relaying chunks");

        let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
        tokio::spawn(pump_upstream(response, tx));

        Ok(ReceiverStream::new(rx).map(Ok))
    }
}

/// Copies upstream SSE chunks into the response channel.
///
/// The upstream's own `[DONE]` line is consumed rather than forwarded so
/// the sentinel appears exactly once, appended here after the last chunk.
async fn pump_upstream(response: reqwest::Response, tx: mpsc::Sender<Event>) {
    let mut decoder = SseFrameDecoder::default();
    let mut upstream = response.bytes_stream();

    'upstream: while let Some(chunk) = upstream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "upstream stream ended with error");
                break;
            },
        };

        for payload in decoder.feed(&bytes) {
            if payload == DONE_SENTINEL {
                break 'upstream;
            }
            if tx.send(Event::default().data(payload)).await.is_err() {
                // Caller disconnected; nothing left to relay.
                return;
            }
        }
    }

    let _ = tx.send(Event::default().data(DONE_SENTINEL)).await;
}

/// Incremental server-sent-event framing decoder.
///
/// Network reads can split an event anywhere, so the decoder buffers
/// bytes until a blank line completes a frame and then yields the joined
/// `data:` payload. Non-data fields and comments are ignored.
#[derive(Debug, Default)]
struct SseFrameDecoder {
    buf: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseFrameDecoder {
    /// Feeds raw bytes, returning the data payloads of frames completed
    /// by this chunk.
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut complete = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    complete.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data_lines.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }
        complete
    }
}
