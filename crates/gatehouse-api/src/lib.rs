//! Gatehouse HTTP API.
//!
//! Wires the authentication core and the streaming relay into an axum
//! service: configuration loading, the signature-checking middleware, the
//! health endpoints, and the completion relay route.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use gatehouse_auth::{HttpDirectorySource, KeyDirectoryClient, RequestAuthenticator};

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod relay;
pub mod server;

pub use config::Config;
pub use relay::{RelayClient, RelayConfig};
pub use server::{create_router, start_server};

/// Shared application state behind the router.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,
    /// Key directory client, exposed for health reporting.
    pub directory: KeyDirectoryClient,
    /// Authorization decision maker for inbound requests.
    pub authenticator: RequestAuthenticator,
    /// Upstream completion relay.
    pub relay: RelayClient,
}

impl AppState {
    /// Builds state from pre-constructed collaborators.
    ///
    /// Tests use this entry point to substitute an in-memory directory
    /// source or a relay pointed at a mock upstream.
    pub fn new(config: Config, directory: KeyDirectoryClient, relay: RelayClient) -> Self {
        let authenticator = RequestAuthenticator::new(directory.clone(), config.verify_strategy);
        Self { config, directory, authenticator, relay }
    }

    /// Builds production state straight from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the directory or relay HTTP clients cannot be constructed.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let source = HttpDirectorySource::new(config.to_directory_config())?;
        let directory = KeyDirectoryClient::new(Arc::new(source));
        let relay = RelayClient::new(config.to_relay_config())?;
        Ok(Self::new(config, directory, relay))
    }
}
