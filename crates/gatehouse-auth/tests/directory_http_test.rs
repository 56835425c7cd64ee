//! Integration tests for the HTTP directory source over a real socket.
//!
//! Exercises conditional revalidation (ETag / If-None-Match / 304), bearer
//! credential attachment, and failure propagation through the production
//! `HttpDirectorySource`, with the authenticator on top where the behavior
//! under test is the final decision.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_auth::{
    DirectoryConfig, DirectoryError, HttpDirectorySource, KeyDirectoryClient,
    RequestAuthenticator, RefreshOutcome,
};
use gatehouse_core::{AuthDecision, KeyRecord, RejectReason, SignedRequest, VerifyStrategy};
use gatehouse_testing::{hmac_signature, FakeKeyDirectory};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(directory: &FakeKeyDirectory, bearer_token: Option<&str>) -> KeyDirectoryClient {
    let source = HttpDirectorySource::new(DirectoryConfig {
        url: directory.url(),
        bearer_token: bearer_token.map(str::to_owned),
        timeout: Duration::from_secs(5),
    })
    .expect("client builds");
    KeyDirectoryClient::new(Arc::new(source))
}

fn secret_record(id: &str, secret: &str) -> KeyRecord {
    KeyRecord { identifier: id.into(), material: secret.into() }
}

#[tokio::test]
async fn fresh_fetch_populates_cache_from_http() {
    let directory = FakeKeyDirectory::start().await;
    directory.publish("\"etag-1\"", &[secret_record("kid-1", "secret")]).await;

    let client = client_for(&directory, None);
    let outcome = client.refresh(0).await.unwrap();

    assert_eq!(outcome, RefreshOutcome::Fetched);
    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.revalidation_token.as_deref(), Some("\"etag-1\""));
    assert_eq!(client.resolve("kid-1").await.unwrap().material, "secret");
}

#[tokio::test]
async fn http_304_keeps_cache_and_resolution_working() {
    let directory = FakeKeyDirectory::start().await;
    directory.publish("\"etag-1\"", &[secret_record("kid-1", "secret")]).await;

    let client = client_for(&directory, None);
    client.refresh(0).await.unwrap();
    let before = client.snapshot().await;

    // The fake answers 304 with no body when the cached token matches.
    let outcome = client.refresh(before.generation).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::NotModified);

    let after = client.snapshot().await;
    assert_eq!(*before, *after);
    assert_eq!(client.resolve("kid-1").await.unwrap().material, "secret");
    assert_eq!(directory.request_count().await, 2);
}

#[tokio::test]
async fn http_500_surfaces_as_directory_unavailable_decision() {
    let directory = FakeKeyDirectory::start().await;
    directory.respond_with_status(500).await;

    let authenticator =
        RequestAuthenticator::new(client_for(&directory, None), VerifyStrategy::HmacSha256);

    let signature = hmac_signature("secret", b"hello");
    let decision = authenticator
        .authorize(SignedRequest {
            raw_body: b"hello",
            signature: &signature,
            key_identifier: "kid-1",
        })
        .await;

    assert_eq!(decision, AuthDecision::reject(RejectReason::DirectoryUnavailable));
}

#[tokio::test]
async fn connection_refused_is_unreachable_not_a_panic() {
    // Nothing listens on this port.
    let source = HttpDirectorySource::new(DirectoryConfig {
        url: "http://127.0.0.1:9/public_keys".into(),
        bearer_token: None,
        timeout: Duration::from_secs(1),
    })
    .unwrap();
    let client = KeyDirectoryClient::new(Arc::new(source));

    let err = client.refresh(0).await.unwrap_err();
    assert!(matches!(err, DirectoryError::Unreachable { .. }));
    assert!(client.snapshot().await.is_initial());
}

#[tokio::test]
async fn bearer_credential_is_attached_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public_keys"))
        .and(header("authorization", "Bearer directory-token"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"e1\"").set_body_json(
            serde_json::json!({ "public_keys": [ { "key_identifier": "kid-1", "key": "secret" } ] }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpDirectorySource::new(DirectoryConfig {
        url: format!("{}/public_keys", server.uri()),
        bearer_token: Some("directory-token".into()),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    let client = KeyDirectoryClient::new(Arc::new(source));

    assert_eq!(client.refresh(0).await.unwrap(), RefreshOutcome::Fetched);
}

#[tokio::test]
async fn malformed_directory_body_is_an_error_not_an_empty_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let source = HttpDirectorySource::new(DirectoryConfig {
        url: format!("{}/public_keys", server.uri()),
        bearer_token: None,
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    let client = KeyDirectoryClient::new(Arc::new(source));

    let err = client.refresh(0).await.unwrap_err();
    assert!(matches!(err, DirectoryError::MalformedResponse { .. }));
    assert!(client.snapshot().await.is_initial());
}

#[tokio::test]
async fn rotation_over_http_resolves_after_one_extra_fetch() {
    let directory = FakeKeyDirectory::start().await;
    directory.publish("\"etag-1\"", &[secret_record("kid-old", "old-secret")]).await;

    let authenticator =
        RequestAuthenticator::new(client_for(&directory, None), VerifyStrategy::HmacSha256);

    let warm = hmac_signature("old-secret", b"warm");
    let decision = authenticator
        .authorize(SignedRequest { raw_body: b"warm", signature: &warm, key_identifier: "kid-old" })
        .await;
    assert_eq!(decision, AuthDecision::allow());
    assert_eq!(directory.request_count().await, 1);

    directory.publish("\"etag-2\"", &[secret_record("kid-new", "new-secret")]).await;

    let signature = hmac_signature("new-secret", b"hello");
    let decision = authenticator
        .authorize(SignedRequest {
            raw_body: b"hello",
            signature: &signature,
            key_identifier: "kid-new",
        })
        .await;
    assert_eq!(decision, AuthDecision::allow());
    assert_eq!(directory.request_count().await, 1, "fake was reset; rotation cost one fetch");
}
