//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Select JSON or text output from config
//!
//! # Design Decisions
//! - JSON for production, text for local runs
//! - `RUST_LOG` overrides the configured level when set

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::LogConfig;

/// Install the global subscriber.
pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = env_filter(&config.level.to_ascii_lowercase());
    let registry = tracing_subscriber::registry().with(filter);

    match config.format.to_ascii_lowercase().as_str() {
        "text" => registry.with(fmt::layer().with_target(false)).try_init(),
        _ => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
