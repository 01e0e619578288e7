//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags / env (cli.rs)
//!     → config file (TOML)
//!     → loader.rs (locate, parse, apply CLI overrides)
//!     → validation.rs (semantic checks, all errors at once)
//!     → defaults applied
//!     → ProxyConfig (validated, immutable)
//!     → ForwardingConfig snapshot shared via Arc with the forwarding engine
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load, ConfigError, LoadedConfig};
pub use schema::{
    LogConfig, MetricsConfig, ProxyConfig, RateLimitConfig, ServerConfig, UpstreamConfig,
    VulnersConfig,
};
pub use validation::ValidationError;
