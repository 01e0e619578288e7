//! Request logging middleware.
//! One structured entry per inbound request; health checks log at DEBUG.
//!
//! `duration_ms` here ends when the response head is ready. Proxied bodies
//! stream afterwards; the relay logs their total time when they end.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::request::RequestIdExt;
use crate::routing::HEALTHZ_PATH;

pub async fn request_log_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request.request_id().to_string();
    let remote_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;

    if path == HEALTHZ_PATH {
        tracing::debug!(
            method = %method,
            path = %path,
            status,
            duration_ms,
            request_id = %request_id,
            remote_ip = %remote_ip,
            "Request completed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status,
            duration_ms,
            request_id = %request_id,
            remote_ip = %remote_ip,
            "Request completed"
        );
    }

    response
}
