//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//!
//! Integer fields use `0` as "unset": TOML cannot tell an explicit zero from
//! an omitted key, so [`ProxyConfig::apply_defaults`] fills zeros after
//! validation.

use serde::{Deserialize, Serialize};

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default listen port.
pub const DEFAULT_PORT: u32 = 8000;
/// Default maximum inbound body size (10 MiB).
pub const DEFAULT_BODY_MAX_BYTES: u64 = 10 * 1024 * 1024;
/// Default upstream call timeout.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
/// Default idle connections kept per upstream host.
pub const DEFAULT_IDLE_CONNECTIONS: usize = 100;
/// Default metrics exposition path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Inbound HTTP server settings.
    pub server: ServerConfig,

    /// Vulners API credentials.
    pub vulners: VulnersConfig,

    /// Upstream connection settings.
    pub upstream: UpstreamConfig,

    /// Logging settings.
    pub log: LogConfig,

    /// Prometheus metrics settings.
    pub metrics: MetricsConfig,
}

/// Inbound HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen host.
    pub host: String,

    /// Listen port. `0` means "use default".
    pub port: u32,

    /// Maximum inbound request body in bytes.
    pub body_max_bytes: u64,

    /// Per-IP rate limiting.
    pub rate_limit: RateLimitConfig,
}

impl ServerConfig {
    /// Listen address as `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Per-IP request rate limiting.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client IP.
    pub requests_per_second: f64,
}

/// Vulners API credentials.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct VulnersConfig {
    /// Shared API key. Empty means per-request `X-Api-Key` mode.
    pub api_key: String,
}

impl std::fmt::Debug for VulnersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.api_key.is_empty() { "" } else { "[REDACTED]" };
        f.debug_struct("VulnersConfig").field("api_key", &key).finish()
    }
}

/// Upstream connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream base URL. Must be HTTPS.
    pub base_url: String,

    /// Per-call timeout in seconds. `0` means "use default".
    pub timeout_seconds: u64,

    /// Idle pooled connections per host. `0` means "use default".
    pub idle_connections: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// debug, info, warn or error.
    pub level: String,

    /// json or text.
    pub format: String,
}

/// Prometheus metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the metrics endpoint and collectors.
    pub enabled: bool,

    /// Exposition path on the main listener.
    pub path: String,
}

impl ProxyConfig {
    /// Fill zero-valued fields with defaults.
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = DEFAULT_HOST.to_string();
        }
        if self.server.port == 0 {
            self.server.port = DEFAULT_PORT;
        }
        if self.server.body_max_bytes == 0 {
            self.server.body_max_bytes = DEFAULT_BODY_MAX_BYTES;
        }
        if self.upstream.timeout_seconds == 0 {
            self.upstream.timeout_seconds = DEFAULT_TIMEOUT_SECONDS;
        }
        if self.upstream.idle_connections == 0 {
            self.upstream.idle_connections = DEFAULT_IDLE_CONNECTIONS;
        }
        if self.log.level.is_empty() {
            self.log.level = "info".to_string();
        }
        if self.log.format.is_empty() {
            self.log.format = "json".to_string();
        }
        if self.metrics.path.is_empty() {
            self.metrics.path = DEFAULT_METRICS_PATH.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_unset_fields() {
        let mut config = ProxyConfig::default();
        config.apply_defaults();

        assert_eq!(config.server.addr(), "0.0.0.0:8000");
        assert_eq!(config.server.body_max_bytes, DEFAULT_BODY_MAX_BYTES);
        assert_eq!(config.upstream.timeout_seconds, 120);
        assert_eq!(config.upstream.idle_connections, 100);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "json");
        assert_eq!(config.metrics.path, "/metrics");
    }

    #[test]
    fn test_defaults_keep_explicit_values() {
        let mut config = ProxyConfig::default();
        config.server.port = 9000;
        config.upstream.timeout_seconds = 5;
        config.log.format = "text".into();
        config.apply_defaults();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.upstream.timeout_seconds, 5);
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let vulners = VulnersConfig { api_key: "SECRET".into() };
        let rendered = format!("{:?}", vulners);
        assert!(!rendered.contains("SECRET"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            base_url = "https://vulners.com"

            [server.rate_limit]
            enabled = true
            requests_per_second = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.base_url, "https://vulners.com");
        assert!(config.server.rate_limit.enabled);
        assert_eq!(config.server.rate_limit.requests_per_second, 2.5);
        assert!(config.vulners.api_key.is_empty());
    }
}
