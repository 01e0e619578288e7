//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     → allowlist.rs (upstream host must be allowed, scheme must be https)
//!
//! Incoming request:
//!     → rate_limit.rs (check per-IP limits)
//!     → credentials.rs (shared key, else X-Api-Key)
//!     → headers.rs (allow-list request headers, stamp User-Agent)
//!     → [upstream call]
//!     → headers.rs (allow-list response headers)
//!
//! Any failure:
//!     → redact.rs (strip credentials before logging)
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown headers and parameters are dropped
//! - No trust in client input, including forwarded-for headers
//! - The credential never appears in logs or client responses

pub mod allowlist;
pub mod credentials;
pub mod headers;
pub mod rate_limit;
pub mod redact;

pub use allowlist::UpstreamBase;
pub use credentials::{resolve_api_key, ApiKey};
pub use headers::{filter_request_headers, filter_response_headers};
pub use redact::{redact_credentials, sanitize_error};
