//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → connection.rs (HTTP/1.1 + HTTP/2, header-read and idle limits)
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → middleware/ (request log, metrics)
//!     → [forwarding engine] or health.rs (local health checks)
//!     → response.rs (status + filtered headers, streamed body)
//!     → Send to client
//! ```

pub mod connection;
pub mod health;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;


pub use connection::ConnectionLimits;
pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use response::{stream_response, RelayBody};
pub use server::{AppState, HttpServer};
