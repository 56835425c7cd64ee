//! Health check handlers for service monitoring.
//!
//! Provides liveness, readiness, and health endpoints for orchestration
//! systems. The health endpoint reports the state of the key directory
//! cache; an unpopulated cache means every signed request would currently
//! fail closed, which is worth surfacing before traffic arrives.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Some non-critical issues detected
    Degraded,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Key directory cache state
    pub key_directory: DirectoryHealth,
}

/// Key directory cache health details.
#[derive(Debug, Serialize)]
pub struct DirectoryHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Cache generation; zero means no successful fetch yet
    pub generation: u64,
    /// Number of cached signing keys
    pub key_count: usize,
}

/// Component-level health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is experiencing issues
    Down,
}

/// Primary health check endpoint.
///
/// Reports the key directory cache state. An empty cache is degraded
/// rather than unhealthy: the first authenticated request triggers a
/// fetch, so a freshly started instance heals itself under traffic.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.directory.snapshot().await;

    let directory = DirectoryHealth {
        status: if snapshot.is_initial() { ComponentStatus::Down } else { ComponentStatus::Up },
        generation: snapshot.generation,
        key_count: snapshot.records.len(),
    };

    let status =
        if snapshot.is_initial() { HealthStatus::Degraded } else { HealthStatus::Healthy };

    debug!(
        status = ?status,
        generation = directory.generation,
        key_count = directory.key_count,
        "Health check completed"
    );

    let response = HealthResponse {
        status,
        timestamp: Utc::now(),
        checks: HealthChecks { key_directory: directory },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Readiness check endpoint for load balancer probes.
///
/// Answers as soon as the HTTP server is up. The directory cache fills
/// lazily, so readiness deliberately does not wait for it.
#[instrument(name = "readiness_check")]
pub async fn readiness_check() -> Response {
    let response = serde_json::json!({ "ready": "Ok!" });
    (StatusCode::OK, Json(response)).into_response()
}

/// Liveness check endpoint for orchestration probes.
///
/// Returns a minimal response indicating the service process is alive,
/// without touching any external dependency.
#[instrument(name = "liveness_check")]
pub async fn liveness_check() -> Response {
    debug!("Performing liveness check");

    let response = serde_json::json!({
        "status": "alive",
        "timestamp": Utc::now(),
        "service": "gatehouse-api"
    });

    (StatusCode::OK, Json(response)).into_response()
}
