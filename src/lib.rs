//! Vulners API forwarding proxy library.

// Core subsystems
pub mod config;
pub mod http;
pub mod proxy;
pub mod routing;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{ForwardError, Forwarder, ForwardingConfig};
