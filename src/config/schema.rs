//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the data-access client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// REST API location.
    pub api: ApiConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Retry and timeout defaults for requests.
    pub request: RequestConfig,

    /// Realtime channel settings.
    pub channel: ChannelConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// REST API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL that relative endpoints are resolved against.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default time-to-live for entries in milliseconds.
    pub ttl_ms: u64,

    /// Interval of the caller-owned cleanup sweep in milliseconds.
    pub cleanup_interval_ms: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 5 * 60 * 1000,
            cleanup_interval_ms: 60 * 1000,
        }
    }
}

/// Retry configuration for HTTP requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Retries after the first attempt (total attempts = retries + 1).
    pub retries: u32,

    /// Base delay for linear backoff in milliseconds.
    pub retry_delay_ms: u64,

    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            retry_delay_ms: 1000,
            timeout_ms: 10_000,
        }
    }
}

/// Realtime channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Streaming endpoint (ws:// or wss://). Empty means no target.
    pub url: String,

    /// Reconnect automatically after the connection closes.
    pub reconnect: bool,

    /// Delay before an automatic reconnection in milliseconds.
    pub reconnect_interval_ms: u64,

    /// Maximum consecutive automatic reconnections.
    pub max_retries: u32,

    /// WebSocket sub-protocols offered during the handshake.
    pub protocols: Vec<String>,
}

impl ChannelConfig {
    /// The configured target, if any.
    pub fn target(&self) -> Option<String> {
        if self.url.trim().is_empty() {
            None
        } else {
            Some(self.url.clone())
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect: true,
            reconnect_interval_ms: 3000,
            max_retries: 5,
            protocols: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Environment variable overriding `api.base_url`.
pub const ENV_API_URL: &str = "THEME_TRACKER_API_URL";
/// Environment variable overriding `channel.url`.
pub const ENV_WS_URL: &str = "THEME_TRACKER_WS_URL";
/// Environment variable overriding `observability.log_level`.
pub const ENV_LOG_LEVEL: &str = "THEME_TRACKER_LOG_LEVEL";

impl ClientConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(url) = lookup(ENV_WS_URL) {
            self.channel.url = url;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.observability.log_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.request.retries, 2);
        assert_eq!(config.request.retry_delay_ms, 1000);
        assert_eq!(config.request.timeout_ms, 10_000);
        assert!(config.channel.reconnect);
        assert_eq!(config.channel.reconnect_interval_ms, 3000);
        assert_eq!(config.channel.max_retries, 5);
        assert!(config.channel.protocols.is_empty());
        assert!(config.channel.target().is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [request]
            retries = 4

            [channel]
            url = "ws://localhost:8000/ws"
            protocols = ["v1"]

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.request.retries, 4);
        assert_eq!(config.request.timeout_ms, 10_000);
        assert_eq!(config.channel.target().as_deref(), Some("ws://localhost:8000/ws"));
        assert_eq!(config.channel.protocols, vec!["v1".to_string()]);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.cache.ttl_ms, 300_000);
    }

    #[test]
    fn overrides_replace_non_empty_values() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "https://api.example.com"),
            (ENV_WS_URL, ""),
            (ENV_LOG_LEVEL, "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert!(config.channel.target().is_none());
        assert_eq!(config.observability.log_level, "debug");
    }
}
