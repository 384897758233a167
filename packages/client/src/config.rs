//! Client configuration.
//!
//! Defaults are embedded at compile time from `config/default.toml`.
//! Deployments override individual keys with a TOML file
//! ([`ClientConfig::from_toml_str`]) or, for the API endpoint and
//! credentials, environment variables ([`ClientConfig::from_env`]).

use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "SITE_BOUNDARIES_API_URL";

/// Environment variable overriding `api.auth_token`.
pub const API_TOKEN_ENV: &str = "SITE_BOUNDARIES_API_TOKEN";

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ClientConfigError {
    /// The TOML could not be parsed or did not match the schema.
    #[error("Invalid client configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Full client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Endpoint and credentials.
    pub api: ApiConfig,
    /// Transport retry policy.
    pub retry: RetrySettings,
    /// Circuit breaker thresholds.
    pub breaker: BreakerSettings,
    /// Boundary existence cache.
    pub cache: CacheSettings,
}

/// The `[api]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the boundary API.
    pub base_url: String,
    /// Value sent in the auth header, verbatim.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Name of the auth header.
    pub auth_header: String,
}

/// The `[retry]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Per-attempt deadline, in milliseconds.
    pub attempt_timeout_ms: u64,
}

impl RetrySettings {
    /// Converts to a [`RetryPolicy`].
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }
}

/// The `[breaker]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Seconds the breaker stays open.
    pub cooldown_secs: u64,
}

impl BreakerSettings {
    /// Returns the cooldown as a [`Duration`].
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// The `[cache]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CacheSettings {
    /// Seconds a boundary existence entry stays fresh.
    pub ttl_secs: u64,
}

impl CacheSettings {
    /// Returns the TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl ClientConfig {
    /// Parses a TOML document, filling unspecified keys from the
    /// embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ClientConfigError`] if either document is invalid.
    pub fn from_toml_str(overrides: &str) -> Result<Self, ClientConfigError> {
        let mut merged: toml::Table = toml::de::from_str(DEFAULT_CONFIG)?;
        let overrides: toml::Table = toml::de::from_str(overrides)?;
        merge(&mut merged, overrides);
        Ok(toml::Value::Table(merged).try_into()?)
    }

    /// Loads the defaults and applies environment overrides.
    ///
    /// # Panics
    ///
    /// Panics if the embedded default configuration is malformed. Since
    /// it is a compile-time constant this indicates a development error
    /// and is caught by tests.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api.base_url = url;
        }
        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            config.api.auth_token = Some(token);
        }
        config
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        toml::de::from_str(DEFAULT_CONFIG)
            .unwrap_or_else(|e| panic!("Failed to parse embedded client config: {e}"))
    }
}

/// Recursively merges `overrides` into `base`; tables merge key by key,
/// any other value replaces.
fn merge(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        let value = match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
                continue;
            }
            (_, value) => value,
        };
        base.insert(key, value);
    }
}
