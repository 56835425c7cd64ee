//! Tests for the caching directory client over an in-memory source.
//!
//! Moved out of `src/directory.rs`: these tests use `MockDirectorySource`
//! from `gatehouse-testing`, which links the library build of
//! `gatehouse-auth`, so they must run as an integration test to see the
//! same `DirectorySource` trait.

use std::sync::Arc;

use gatehouse_auth::{DirectoryError, KeyDirectoryClient, RefreshOutcome};
use gatehouse_core::KeyRecord;
use gatehouse_testing::MockDirectorySource;

fn record(id: &str, material: &str) -> KeyRecord {
    KeyRecord { identifier: id.into(), material: material.into() }
}

#[tokio::test]
async fn first_refresh_populates_empty_cache() {
    let source = Arc::new(MockDirectorySource::new());
    source.publish("etag-1", vec![record("kid-1", "pem-1")]);

    let client = KeyDirectoryClient::new(source.clone());
    assert!(client.snapshot().await.is_initial());

    let outcome = client.refresh(0).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Fetched);
    assert_eq!(source.fetch_count(), 1);

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.revalidation_token.as_deref(), Some("etag-1"));
    assert_eq!(client.resolve("kid-1").await.unwrap().material, "pem-1");
}

#[tokio::test]
async fn not_modified_leaves_cache_value_identical() {
    let source = Arc::new(MockDirectorySource::new());
    source.publish("etag-1", vec![record("kid-1", "pem-1"), record("kid-2", "pem-2")]);

    let client = KeyDirectoryClient::new(source.clone());
    client.refresh(0).await.unwrap();
    let before = client.snapshot().await;

    // Same ETag published: source now answers NotModified.
    let outcome = client.refresh(before.generation).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::NotModified);

    let after = client.snapshot().await;
    assert_eq!(*before, *after);
    assert_eq!(client.resolve("kid-2").await.unwrap().material, "pem-2");
}

#[tokio::test]
async fn failed_fetch_leaves_cache_untouched() {
    let source = Arc::new(MockDirectorySource::new());
    source.publish("etag-1", vec![record("kid-1", "pem-1")]);

    let client = KeyDirectoryClient::new(source.clone());
    client.refresh(0).await.unwrap();

    source.fail_with_status(500);
    let err = client.refresh(1).await.unwrap_err();
    assert!(matches!(err, DirectoryError::BadStatus { status: 500 }));

    // Cache still serves the last successful fetch.
    assert_eq!(client.resolve("kid-1").await.unwrap().material, "pem-1");
    assert_eq!(client.snapshot().await.generation, 1);
}

#[tokio::test]
async fn rotation_replaces_whole_snapshot() {
    let source = Arc::new(MockDirectorySource::new());
    source.publish("etag-1", vec![record("kid-old", "pem-old")]);

    let client = KeyDirectoryClient::new(source.clone());
    client.refresh(0).await.unwrap();
    assert!(client.resolve("kid-old").await.is_some());

    source.publish("etag-2", vec![record("kid-new", "pem-new")]);
    let outcome = client.refresh(1).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Fetched);

    assert!(client.resolve("kid-old").await.is_none());
    assert_eq!(client.resolve("kid-new").await.unwrap().material, "pem-new");
    assert_eq!(client.snapshot().await.revalidation_token.as_deref(), Some("etag-2"));
}

#[tokio::test]
async fn stale_generation_coalesces_without_fetching() {
    let source = Arc::new(MockDirectorySource::new());
    source.publish("etag-1", vec![record("kid-1", "pem-1")]);

    let client = KeyDirectoryClient::new(source.clone());
    client.refresh(0).await.unwrap();
    assert_eq!(source.fetch_count(), 1);

    // A caller that observed generation 0 before the refresh landed
    // must not trigger a second fetch.
    let outcome = client.refresh(0).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Coalesced);
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn concurrent_refreshes_fetch_once() {
    let source = Arc::new(MockDirectorySource::new());
    source.publish("etag-1", vec![record("kid-1", "pem-1")]);

    let client = KeyDirectoryClient::new(source.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.refresh(0).await }));
    }

    let mut fetched = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            RefreshOutcome::Fetched => fetched += 1,
            RefreshOutcome::Coalesced => {},
            RefreshOutcome::NotModified => panic!("unexpected not-modified"),
        }
    }

    assert_eq!(fetched, 1);
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn readers_never_observe_mixed_generations() {
    let source = Arc::new(MockDirectorySource::new());
    source.publish("etag-1", vec![record("kid-a", "gen1"), record("kid-b", "gen1")]);

    let client = KeyDirectoryClient::new(source.clone());
    client.refresh(0).await.unwrap();

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let snapshot = client.snapshot().await;
                    assert!(!snapshot.records.is_empty(), "observed an empty key set");
                    let materials: Vec<_> =
                        snapshot.records.iter().map(|r| r.material.as_str()).collect();
                    assert!(
                        materials.iter().all(|m| *m == materials[0]),
                        "observed records from two fetch generations"
                    );
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let writer = {
        let client = client.clone();
        let source = source.clone();
        tokio::spawn(async move {
            for generation in 1..6u64 {
                let label = if generation % 2 == 0 { "gen1" } else { "gen2" };
                source.publish(
                    format!("etag-{generation}"),
                    vec![record("kid-a", label), record("kid-b", label)],
                );
                client.refresh(generation).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
