//! Upstream connectivity.
//!
//! # Data Flow
//! ```text
//! Forwarder
//!     → client.rs (pooled HTTPS, deadline, cancellation)
//!     → vulners.com
//! ```

pub mod client;

pub use client::UpstreamClient;
