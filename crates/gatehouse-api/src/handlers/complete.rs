//! Completion relay handler.
//!
//! Runs only for requests the signature middleware has already authorized.
//! Parses the chat payload, forwards it upstream with the caller's own
//! bearer credential, and re-emits the upstream completion as a
//! server-sent event stream terminated by a `[DONE]` sentinel.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{sse::Sse, IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::{
    handlers::error_response,
    relay::{ChatRequest, RelayError},
    AppState,
};

/// Relays an authorized chat completion to the upstream provider.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 400: Missing upstream credential or malformed chat payload
/// - 502: Upstream unreachable or answered with an error before streaming
#[instrument(
    name = "relay_completion",
    skip(state, headers, body),
    fields(content_length = body.len())
)]
pub async fn relay_completion(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let bearer_token = headers
        .get(&state.config.upstream_token_header)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if bearer_token.is_empty() {
        warn!(header = %state.config.upstream_token_header, "Missing upstream credential");
        return error_response(
            StatusCode::BAD_REQUEST,
            "missing_upstream_token",
            format!("request must carry an upstream token in {}", state.config.upstream_token_header),
        );
    }

    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed chat payload");
            return error_response(
                StatusCode::BAD_REQUEST,
                "malformed_payload",
                format!("invalid chat payload: {e}"),
            );
        },
    };

    info!(message_count = request.messages.len(), "Relaying completion upstream");

    match state.relay.stream_completion(request, bearer_token).await {
        Ok(stream) => Sse::new(stream).into_response(),
        Err(e @ RelayError::UpstreamStatus { status }) => {
            warn!(upstream_status = status, "Upstream rejected the completion");
            error_response(StatusCode::BAD_GATEWAY, "upstream_error", e.to_string())
        },
        Err(e) => {
            warn!(error = %e, "Failed to open upstream completion");
            error_response(StatusCode::BAD_GATEWAY, "upstream_unreachable", e.to_string())
        },
    }
}
