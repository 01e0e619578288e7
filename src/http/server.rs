//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: proxied prefixes, health routes, metrics
//! - Wire up middleware (request ID, logging, metrics, limits, headers)
//! - Bind the server to a listener and drain on shutdown
//! - Hand proxied requests to the forwarding engine

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::RequestBodyTimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::connection::{serve_connection, ConnectionLimits};
use crate::http::health::{healthz, proxy_status};
use crate::http::middleware::{metrics_middleware, request_log_middleware};
use crate::http::request::UuidRequestId;
use crate::http::response::stream_response;
use crate::proxy::{ForwardError, Forwarder, InboundRequest};
use crate::routing::{HEALTHZ_PATH, STATUS_PATH};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiterState};

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    limits: ConnectionLimits,
}

impl HttpServer {
    /// Create a new HTTP server.
    ///
    /// `metrics` is the Prometheus handle when metrics are enabled.
    pub fn new(config: &ProxyConfig, forwarder: Forwarder, metrics: Option<PrometheusHandle>) -> Self {
        Self::with_limits(config, forwarder, metrics, ConnectionLimits::default())
    }

    /// Create a server with explicit inbound connection limits.
    pub fn with_limits(
        config: &ProxyConfig,
        forwarder: Forwarder,
        metrics: Option<PrometheusHandle>,
        limits: ConnectionLimits,
    ) -> Self {
        let state = AppState { forwarder };
        Self {
            router: Self::build_router(config, state, metrics, limits),
            limits,
        }
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &ProxyConfig,
        state: AppState,
        metrics: Option<PrometheusHandle>,
        limits: ConnectionLimits,
    ) -> Router {
        let mut routes: Router<AppState> = Router::new()
            .route("/api/v3/", any(proxy_handler))
            .route("/api/v3/{*rest}", any(proxy_handler))
            .route("/api/v4/", any(proxy_handler))
            .route("/api/v4/{*rest}", any(proxy_handler))
            .route(HEALTHZ_PATH, get(healthz))
            .route(STATUS_PATH, get(proxy_status));

        if let Some(handle) = metrics.clone() {
            routes = routes.route(
                &config.metrics.path,
                get(move || std::future::ready(handle.render())),
            );
        }

        let mut router = routes.with_state(state).layer(catch_panic_layer());

        // Innermost first.
        if config.server.rate_limit.enabled {
            let limiter = Arc::new(RateLimiterState::from_config(&config.server.rate_limit));
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        let body_limit = usize::try_from(config.server.body_max_bytes).unwrap_or(usize::MAX);
        router = router
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(RequestBodyTimeoutLayer::new(limits.body_read_timeout))
            .layer(RequestBodyLimitLayer::new(body_limit));

        if metrics.is_some() {
            router = router.layer(middleware::from_fn(metrics_middleware));
        }

        router
            .layer(middleware::from_fn(request_log_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            header_read_timeout_secs = self.limits.header_read_timeout.as_secs(),
            idle_timeout_secs = self.limits.idle_timeout.as_secs(),
            "HTTP server starting"
        );

        let draining = CancellationToken::new();
        let connections = TaskTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(err) = stream.set_nodelay(true) {
                            tracing::debug!(peer = %peer, error = %err, "Failed to set TCP_NODELAY");
                        }
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            self.router.clone(),
                            self.limits,
                            draining.clone(),
                        ));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, draining connections");
                    break;
                }
            }
        }

        drop(listener);
        draining.cancel();
        connections.close();
        connections.wait().await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Turns a handler panic into a 500 instead of a dropped connection.
pub fn catch_panic_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response<Body>> {
    CatchPanicLayer::custom(panic_response as fn(Box<dyn Any + Send + 'static>) -> Response<Body>)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error" })),
    )
        .into_response()
}

/// Reports a client disconnect if the handler is dropped mid-forward.
///
/// hyper drops the whole handler future when the client goes away, so the
/// forwarder never gets to return an error of its own.
struct DisconnectGuard {
    method: Method,
    path: String,
    armed: bool,
}

impl DisconnectGuard {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.armed {
            ForwardError::ClientDisconnected.report(self.method.as_str(), &self.path);
        }
    }
}

/// Proxy handler for `/api/v3/*` and `/api/v4/*`.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let path = request.uri().path().to_string();
    let mut disconnect = DisconnectGuard::new(request.method().clone(), &path);

    // Cancels the upstream call if this future is dropped.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let result = state
        .forwarder
        .forward(InboundRequest::from_http(request, cancel))
        .await;
    disconnect.disarm();

    match result {
        Ok(upstream) => stream_response(upstream, &path, started),
        Err(err) => {
            err.report(disconnect.method.as_str(), &path);
            err.into_response()
        }
    }
}
