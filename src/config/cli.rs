//! Command-line arguments.

use clap::Parser;

use crate::config::schema::ProxyConfig;

/// Reverse proxy for the Vulners API.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "vulners-proxy", version, about = "Reverse proxy for the Vulners API.")]
pub struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, env = "CONFIG_PATH")]
    pub config: Option<String>,

    /// Listen host (overrides config).
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Listen port (overrides config).
    #[arg(short, long, env = "PORT")]
    pub port: Option<u32>,

    /// Vulners API key (overrides config).
    #[arg(long, env = "VULNERS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Log level: debug|info|warn|error (overrides config).
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Override config values with non-empty CLI values.
    pub fn apply_to(&self, config: &mut ProxyConfig) {
        if let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) {
            config.server.host = host.to_string();
        }
        if let Some(port) = self.port.filter(|p| *p != 0) {
            config.server.port = port;
        }
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            config.vulners.api_key = key.to_string();
        }
        if let Some(level) = self.log_level.as_deref().filter(|l| !l.is_empty()) {
            config.log.level = level.to_string();
        }
    }
}
