//! Inbound request metrics middleware.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::observability::metrics::{self, InFlightGuard};

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = metrics::normalize_method(request.method());
    let path_prefix = metrics::normalize_path(request.uri().path());
    let start = Instant::now();

    // Dropped on cancellation too, so the gauge never leaks.
    let _in_flight = InFlightGuard::new();
    let response = next.run(request).await;

    metrics::record_request(method, response.status().as_u16(), path_prefix, start);
    response
}
