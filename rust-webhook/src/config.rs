//! Configuration module for environment variable parsing.
//!
//! Every setting has a default and parsing never fails. Missing secrets are
//! reported at startup; a missing store URL is rejected when the store is
//! built unless the in-memory fallback is explicitly enabled.

use std::env;
use tracing::warn;

/// Verify token used when `WHATSAPP_VERIFY_TOKEN` is not set.
pub const DEFAULT_VERIFY_TOKEN: &str = "your_verify_token";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Secret echoed by the provider in `hub.verify_token` during the handshake
    pub verify_token: String,

    /// Meta app secret for `X-Hub-Signature-256` verification
    pub app_secret: Option<String>,

    /// Message store settings
    pub store: StoreConfig,
}

/// Connection settings for the message store data API.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the data API (e.g. `https://data.mongodb-api.com/app/<id>/endpoint/data/v1`)
    pub url: Option<String>,

    /// API key sent in the `api-key` header
    pub api_key: Option<String>,

    /// Cluster / data source name
    pub data_source: String,

    pub database: String,

    pub collection: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Allow a non-persistent in-memory store when `url` is unset
    pub in_memory_fallback: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            data_source: "Cluster0".to_string(),
            database: "whatsapp".to_string(),
            collection: "messages".to_string(),
            timeout_ms: 5000,
            in_memory_fallback: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = StoreConfig::default();

        Config {
            port: parse_or("PORT", 8000),

            verify_token: env::var("WHATSAPP_VERIFY_TOKEN")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_VERIFY_TOKEN.to_string()),

            app_secret: non_empty("WHATSAPP_APP_SECRET"),

            store: StoreConfig {
                url: non_empty("MESSAGE_STORE_URL"),
                api_key: non_empty("MESSAGE_STORE_API_KEY"),
                data_source: env::var("MESSAGE_STORE_DATA_SOURCE")
                    .unwrap_or(defaults.data_source),
                database: env::var("MESSAGE_STORE_DATABASE").unwrap_or(defaults.database),
                collection: env::var("MESSAGE_STORE_COLLECTION")
                    .unwrap_or(defaults.collection),
                timeout_ms: parse_or("MESSAGE_STORE_TIMEOUT_MS", defaults.timeout_ms),
                in_memory_fallback: parse_or(
                    "MESSAGE_STORE_IN_MEMORY",
                    defaults.in_memory_fallback,
                ),
            },
        }
    }

    /// Build a configuration for tests and embedding, with no store backend.
    pub fn with_verify_token(verify_token: impl Into<String>) -> Self {
        Config {
            port: 8000,
            verify_token: verify_token.into(),
            app_secret: None,
            store: StoreConfig::default(),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Read an environment variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
