//! Gatehouse signed-webhook gateway.
//!
//! Main entry point for the Gatehouse server. Initializes all subsystems
//! and coordinates graceful startup and shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use gatehouse_api::{AppState, Config};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with structured logging
    init_tracing();

    info!("Starting Gatehouse signed-webhook gateway");

    // Load configuration from defaults, config.toml, and environment
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let addr = config.parse_server_addr().context("Invalid server bind address")?;
    info!(
        server_addr = %addr,
        directory_url = %config.directory_url,
        upstream_url = %config.upstream_url,
        verify_strategy = %config.verify_strategy,
        "Configuration loaded"
    );

    let state = Arc::new(AppState::from_config(config)?);

    // Warm the key directory cache so the first signed request does not
    // pay the fetch latency. A failure here is not fatal; the first
    // request triggers its own refresh.
    let initial_generation = state.directory.snapshot().await.generation;
    match state.directory.refresh(initial_generation).await {
        Ok(_) => {
            let snapshot = state.directory.snapshot().await;
            info!(key_count = snapshot.records.len(), "Key directory cache warmed");
        },
        Err(e) => {
            error!(error = %e, "Key directory warm-up fetch failed, continuing");
        },
    }

    // Start HTTP server
    let server_handle = tokio::spawn({
        let state = state.clone();
        async move {
            if let Err(e) = gatehouse_api::start_server(state, addr).await {
                error!(error = %e, "Server failed");
            }
        }
    });

    info!(addr = %addr, "Gatehouse is ready to receive signed requests");

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received, starting graceful shutdown");

    // Give in-flight requests time to complete
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(30)) => {
            info!("Shutdown grace period expired");
        }
        _ = server_handle => {
            info!("Server stopped");
        }
    }

    info!("Gatehouse shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,gatehouse=debug,tower_http=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
