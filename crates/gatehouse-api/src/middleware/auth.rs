//! Signature-checking middleware for relayed routes.
//!
//! Buffers the request body so the authenticator can verify the detached
//! signature over the exact received bytes, then restores the body for the
//! handler. Rejections map to 403 for caller faults and 503 when the key
//! directory itself is unavailable; the gateway fails closed either way.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use gatehouse_core::{RejectReason, SignedRequest};
use tracing::warn;

use crate::handlers::error_response;
use crate::AppState;

/// Signature verification covers the whole body, so the body must fit in
/// memory. Matches the upstream providers' own payload ceiling.
const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Reads a header as a string, treating absence and non-ASCII as empty.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|value| value.to_str().ok()).unwrap_or("")
}

/// Stable machine-readable code for a rejection reason.
fn reason_code(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::MissingCredentials => "missing_credentials",
        RejectReason::UnknownKey => "unknown_key",
        RejectReason::InvalidSignature => "invalid_signature",
        RejectReason::DirectoryUnavailable => "directory_unavailable",
        RejectReason::MalformedKeyMaterial => "malformed_key_material",
    }
}

/// Axum middleware that authorizes requests by detached signature.
pub async fn require_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, MAX_PAYLOAD_SIZE).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "request body exceeds the signing payload limit",
            );
        },
    };

    let signature = header_str(&parts.headers, &state.config.signature_header);
    let key_identifier = header_str(&parts.headers, &state.config.key_id_header);

    let decision = state
        .authenticator
        .authorize(SignedRequest { raw_body: &bytes, signature, key_identifier })
        .await;

    if let Some(reason) = decision.reason {
        let status = if reason.is_dependency_failure() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::FORBIDDEN
        };
        warn!(%reason, status = status.as_u16(), "rejecting unauthenticated request");
        return error_response(status, reason_code(reason), reason.to_string());
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_str_reads_present_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-signature", HeaderValue::from_static("c2lnbmF0dXJl"));

        assert_eq!(header_str(&headers, "x-signature"), "c2lnbmF0dXJl");
        assert_eq!(header_str(&headers, "x-key-identifier"), "");
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(reason_code(RejectReason::MissingCredentials), "missing_credentials");
        assert_eq!(reason_code(RejectReason::UnknownKey), "unknown_key");
        assert_eq!(reason_code(RejectReason::InvalidSignature), "invalid_signature");
        assert_eq!(reason_code(RejectReason::DirectoryUnavailable), "directory_unavailable");
        assert_eq!(reason_code(RejectReason::MalformedKeyMaterial), "malformed_key_material");
    }
}
