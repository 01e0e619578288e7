//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize subsystems in dependency order
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{self, Cli, ConfigError, LoadedConfig};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};
use crate::proxy::{Forwarder, ForwardingConfig};

/// Fatal startup failures.
#[derive(Error)]
pub enum StartupError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("metrics: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

// `main` prints errors with Debug; keep that readable.
impl std::fmt::Debug for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Bring the proxy up and serve until SIGINT/SIGTERM.
pub async fn run(cli: Cli) -> Result<(), StartupError> {
    let LoadedConfig { config, path } = config::load(&cli)?;

    logging::init(&config.log)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        "vulners-proxy starting"
    );

    config::loader::warn_permissions(&path);

    let metrics_handle = if config.metrics.enabled {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let forwarding = ForwardingConfig::from_config(&config)?;
    tracing::info!(
        upstream = %forwarding.upstream.url(),
        per_request_keys = forwarding.per_request_keys(),
        timeout_secs = forwarding.timeout.as_secs(),
        idle_connections = forwarding.idle_connections,
        "Forwarding configured"
    );
    if forwarding.per_request_keys() {
        tracing::info!("No shared API key configured; clients must send X-Api-Key");
    }

    let forwarder = Forwarder::new(forwarding)?;
    let server = HttpServer::new(&config, forwarder, metrics_handle);

    let listener = TcpListener::bind(config.server.addr()).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        body_max_bytes = config.server.body_max_bytes,
        rate_limit = config.server.rate_limit.enabled,
        metrics = config.metrics.enabled,
        "Listening for connections"
    );

    let shutdown = Arc::new(Shutdown::new());
    let signal_task = signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;
    signal_task.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
