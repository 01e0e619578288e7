//! Header filtering in both directions.
//!
//! # Responsibilities
//! - Reduce inbound headers to the set the upstream may see
//! - Always stamp the proxy's own `User-Agent`
//! - Reduce upstream response headers to the set the client may see
//!
//! # Design Decisions
//! - Allow-lists, never deny-lists: anything unknown is dropped
//! - `HeaderMap` keys are lower-case, so every comparison here is
//!   case-insensitive by construction
//! - Hop-by-hop, auth, cookie and forwarded-for headers are never in an
//!   allow-list and are therefore always dropped

use axum::http::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH,
    CONTENT_TYPE, DATE, USER_AGENT,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Request headers copied to the upstream.
pub static FORWARDABLE_REQUEST_HEADERS: [HeaderName; 5] =
    [ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_TYPE, CONTENT_LENGTH];

/// Vendor prefix whose headers are always forwarded.
pub const VENDOR_HEADER_PREFIX: &str = "x-vulners-";

/// Response headers copied back to the client.
pub static FORWARDABLE_RESPONSE_HEADERS: [HeaderName; 6] = [
    CONTENT_TYPE,
    CONTENT_LENGTH,
    CONTENT_ENCODING,
    CACHE_CONTROL,
    DATE,
    HeaderName::from_static("x-request-id"),
];

/// Headers meaningful for a single hop only.
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// `User-Agent` sent on every upstream call.
pub const OUTBOUND_USER_AGENT: &str = concat!("vulners-proxy/", env!("CARGO_PKG_VERSION"));

/// Build the outbound header set from the inbound one.
pub fn filter_request_headers(src: &HeaderMap, user_agent: &HeaderValue) -> HeaderMap {
    let mut dst = HeaderMap::new();

    for (name, value) in src {
        if is_forwardable_request_header(name) {
            dst.append(name.clone(), value.clone());
        }
    }

    dst.insert(USER_AGENT, user_agent.clone());
    dst
}

/// Build the client header set from the upstream one.
pub fn filter_response_headers(src: &HeaderMap) -> HeaderMap {
    let mut dst = HeaderMap::new();

    for (name, value) in src {
        if FORWARDABLE_RESPONSE_HEADERS.contains(name) {
            dst.append(name.clone(), value.clone());
        }
    }

    dst
}

fn is_forwardable_request_header(name: &HeaderName) -> bool {
    FORWARDABLE_REQUEST_HEADERS.contains(name) || name.as_str().starts_with(VENDOR_HEADER_PREFIX)
}
