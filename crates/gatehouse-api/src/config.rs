//! Configuration management for the Gatehouse gateway service.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use gatehouse_auth::DirectoryConfig;
use gatehouse_core::VerifyStrategy;
use serde::{Deserialize, Serialize};

use crate::relay::RelayConfig;

const CONFIG_FILE: &str = "config.toml";

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// The only values without workable defaults are the key directory URL and
/// the upstream completions URL; `validate()` rejects a configuration that
/// leaves either empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // Key directory
    /// Remote key directory endpoint URL.
    ///
    /// Environment variable: `DIRECTORY_URL`
    #[serde(default, alias = "DIRECTORY_URL")]
    pub directory_url: String,
    /// Optional bearer credential for directory fetches. Raises rate
    /// limits; absence is not an error.
    ///
    /// Environment variable: `DIRECTORY_TOKEN`
    #[serde(default, alias = "DIRECTORY_TOKEN")]
    pub directory_token: Option<String>,
    /// Timeout for a single directory fetch in seconds.
    ///
    /// Environment variable: `DIRECTORY_TIMEOUT_SECONDS`
    #[serde(default = "default_directory_timeout", alias = "DIRECTORY_TIMEOUT_SECONDS")]
    pub directory_timeout_seconds: u64,

    // Verification
    /// Signature verification strategy (`ecdsa-p256` or `hmac-sha256`).
    ///
    /// The strategy decides the trust model: ECDSA verifies against the
    /// directory's published public keys, HMAC treats the published key
    /// material as a shared secret. Exactly one applies per deployment.
    ///
    /// Environment variable: `VERIFY_STRATEGY`
    #[serde(default = "default_verify_strategy", alias = "VERIFY_STRATEGY")]
    pub verify_strategy: VerifyStrategy,
    /// Request header carrying the base64-encoded detached signature.
    ///
    /// Environment variable: `SIGNATURE_HEADER`
    #[serde(default = "default_signature_header", alias = "SIGNATURE_HEADER")]
    pub signature_header: String,
    /// Request header carrying the key identifier.
    ///
    /// Environment variable: `KEY_ID_HEADER`
    #[serde(default = "default_key_id_header", alias = "KEY_ID_HEADER")]
    pub key_id_header: String,

    // Upstream relay
    /// Upstream chat-completions endpoint URL.
    ///
    /// Environment variable: `UPSTREAM_URL`
    #[serde(default, alias = "UPSTREAM_URL")]
    pub upstream_url: String,
    /// Model name sent with upstream completion requests.
    ///
    /// Environment variable: `UPSTREAM_MODEL`
    #[serde(default = "default_upstream_model", alias = "UPSTREAM_MODEL")]
    pub upstream_model: String,
    /// Request header carrying the caller's upstream bearer credential.
    ///
    /// Environment variable: `UPSTREAM_TOKEN_HEADER`
    #[serde(default = "default_upstream_token_header", alias = "UPSTREAM_TOKEN_HEADER")]
    pub upstream_token_header: String,
    /// Connect timeout for upstream requests in seconds. Intentionally a
    /// connect timeout only; a total timeout would cut streams short.
    ///
    /// Environment variable: `UPSTREAM_CONNECT_TIMEOUT_SECONDS`
    #[serde(
        default = "default_upstream_connect_timeout",
        alias = "UPSTREAM_CONNECT_TIMEOUT_SECONDS"
    )]
    pub upstream_connect_timeout_seconds: u64,
    /// Optional system message prepended to every relayed conversation.
    ///
    /// Environment variable: `SYSTEM_PROMPT`
    #[serde(default, alias = "SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment
    /// variable overrides.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the directory client's configuration.
    pub fn to_directory_config(&self) -> DirectoryConfig {
        DirectoryConfig {
            url: self.directory_url.clone(),
            bearer_token: self.directory_token.clone(),
            timeout: Duration::from_secs(self.directory_timeout_seconds),
        }
    }

    /// Convert to the relay's configuration.
    pub fn to_relay_config(&self) -> RelayConfig {
        RelayConfig {
            upstream_url: self.upstream_url.clone(),
            model: self.upstream_model.clone(),
            system_prompt: self.system_prompt.clone(),
            connect_timeout: Duration::from_secs(self.upstream_connect_timeout_seconds),
        }
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.directory_url.is_empty() {
            anyhow::bail!("directory_url must be set");
        }

        if self.upstream_url.is_empty() {
            anyhow::bail!("upstream_url must be set");
        }

        if self.directory_timeout_seconds == 0 {
            anyhow::bail!("directory_timeout_seconds must be greater than 0");
        }

        if self.signature_header.is_empty() || self.key_id_header.is_empty() {
            anyhow::bail!("signature_header and key_id_header must be set");
        }

        if self.upstream_token_header.is_empty() {
            anyhow::bail!("upstream_token_header must be set");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            directory_url: String::new(),
            directory_token: None,
            directory_timeout_seconds: default_directory_timeout(),
            verify_strategy: default_verify_strategy(),
            signature_header: default_signature_header(),
            key_id_header: default_key_id_header(),
            upstream_url: String::new(),
            upstream_model: default_upstream_model(),
            upstream_token_header: default_upstream_token_header(),
            upstream_connect_timeout_seconds: default_upstream_connect_timeout(),
            system_prompt: None,
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_directory_timeout() -> u64 {
    10
}

fn default_verify_strategy() -> VerifyStrategy {
    VerifyStrategy::EcdsaP256
}

fn default_signature_header() -> String {
    "x-signature".to_string()
}

fn default_key_id_header() -> String {
    "x-key-identifier".to_string()
}

fn default_upstream_model() -> String {
    "gpt-4o".to_string()
}

fn default_upstream_token_header() -> String {
    "x-upstream-token".to_string()
}

fn default_upstream_connect_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid() -> Config {
        Config {
            directory_url: "https://keys.example.com/public_keys".into(),
            upstream_url: "https://completions.example.com/chat/completions".into(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_are_complete_except_urls() {
        let config = Config::default();
        assert!(config.validate().is_err(), "empty URLs must not validate");

        let config = minimal_valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8000);
        assert_eq!(config.verify_strategy, VerifyStrategy::EcdsaP256);
        assert_eq!(config.signature_header, "x-signature");
        assert_eq!(config.key_id_header, "x-key-identifier");
        assert_eq!(config.upstream_model, "gpt-4o");
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = minimal_valid();
        config.port = 0;
        assert!(config.validate().is_err());

        config = minimal_valid();
        config.directory_timeout_seconds = 0;
        assert!(config.validate().is_err());

        config = minimal_valid();
        config.signature_header = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn conversions_carry_the_right_fields() {
        let mut config = minimal_valid();
        config.directory_token = Some("token".into());
        config.directory_timeout_seconds = 7;
        config.system_prompt = Some("be helpful".into());

        let directory = config.to_directory_config();
        assert_eq!(directory.url, config.directory_url);
        assert_eq!(directory.bearer_token.as_deref(), Some("token"));
        assert_eq!(directory.timeout, Duration::from_secs(7));

        let relay = config.to_relay_config();
        assert_eq!(relay.upstream_url, config.upstream_url);
        assert_eq!(relay.model, "gpt-4o");
        assert_eq!(relay.system_prompt.as_deref(), Some("be helpful"));
    }

    #[test]
    fn socket_address_parsing() {
        let mut config = minimal_valid();
        config.host = "0.0.0.0".to_string();
        config.port = 9000;

        let addr = config.parse_server_addr().expect("Should parse socket address");
        assert_eq!(addr.port(), 9000);
    }
}
