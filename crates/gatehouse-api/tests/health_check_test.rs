//! Integration tests for the monitoring endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use gatehouse_api::{create_router, AppState, Config, RelayClient};
use gatehouse_auth::KeyDirectoryClient;
use gatehouse_core::KeyRecord;
use gatehouse_testing::MockDirectorySource;
use tower::ServiceExt;

fn test_app(source: Arc<MockDirectorySource>) -> (Router, Arc<AppState>) {
    let config = Config {
        directory_url: "http://127.0.0.1:9/public_keys".to_string(),
        upstream_url: "http://127.0.0.1:9/chat".to_string(),
        ..Config::default()
    };
    let directory = KeyDirectoryClient::new(source);
    let relay = RelayClient::new(config.to_relay_config()).expect("relay client");
    let state = Arc::new(AppState::new(config, directory, relay));
    (create_router(state.clone()), state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).expect("request build");
    let response = app.oneshot(request).await.expect("request execution");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
    (status, serde_json::from_slice(&body).expect("json body"))
}

#[tokio::test]
async fn readiness_answers_immediately() {
    let (app, _state) = test_app(Arc::new(MockDirectorySource::new()));

    let (status, body) = get_json(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], "Ok!");
}

#[tokio::test]
async fn liveness_reports_alive() {
    let (app, _state) = test_app(Arc::new(MockDirectorySource::new()));

    let (status, body) = get_json(app, "/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
    assert_eq!(body["service"], "gatehouse-api");
}

#[tokio::test]
async fn health_is_degraded_until_the_directory_cache_fills() {
    let (app, _state) = test_app(Arc::new(MockDirectorySource::new()));

    let (status, body) = get_json(app, "/health").await;

    // Degraded, not failing: the first signed request heals the cache.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["key_directory"]["status"], "down");
    assert_eq!(body["checks"]["key_directory"]["generation"], 0);
}

#[tokio::test]
async fn health_reports_cached_keys_after_a_refresh() {
    let source = Arc::new(MockDirectorySource::new());
    source.publish("etag-1", vec![
        KeyRecord { identifier: "kid-1".into(), material: "secret-1".into() },
        KeyRecord { identifier: "kid-2".into(), material: "secret-2".into() },
    ]);
    let (app, state) = test_app(source);

    state.directory.refresh(0).await.expect("refresh succeeds");

    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["key_directory"]["status"], "up");
    assert_eq!(body["checks"]["key_directory"]["generation"], 1);
    assert_eq!(body["checks"]["key_directory"]["key_count"], 2);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (app, _state) = test_app(Arc::new(MockDirectorySource::new()));

    let request = Request::builder().uri("/").body(Body::empty()).expect("request build");
    let response = app.oneshot(request).await.expect("request execution");

    assert!(response.headers().contains_key("X-Request-Id"));
}
