//! Per-IP rate limiting middleware.
//!
//! Clients are keyed on the TCP peer address only. `X-Forwarded-For` and
//! `X-Real-IP` are client-controlled and would let a caller pick its own
//! bucket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;

use crate::config::RateLimitConfig;

/// Buckets untouched for this long are dropped.
pub const STALE_AFTER: Duration = Duration::from_secs(180);

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_seen: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_seen).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared limiter state, one bucket per client IP.
///
/// Idle clients are swept out from `check` itself, at most every
/// `stale_after / 2`, so the map tracks recent clients only.
pub struct RateLimiterState {
    buckets: DashMap<IpAddr, TokenBucket>,
    rps: f64,
    burst: f64,
    stale_after: Duration,
    last_sweep: Mutex<Instant>,
}

impl RateLimiterState {
    pub fn new(rps: f64) -> Self {
        Self::with_stale_after(rps, STALE_AFTER)
    }

    pub fn with_stale_after(rps: f64, stale_after: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            rps,
            burst: rps.ceil().max(1.0),
            stale_after,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second)
    }

    /// Take one token for `client`.
    pub fn check(&self, client: IpAddr) -> bool {
        let now = Instant::now();
        self.maybe_sweep(now);

        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.burst, now));
        bucket.try_acquire(self.burst, self.rps, now)
    }

    /// Drop buckets not seen within `stale_after`. Returns how many went.
    pub fn cleanup_stale(&self) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(self.stale_after) else {
            return 0;
        };

        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.last_seen > cutoff);
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = self.buckets.len(),
                "Dropped idle rate limit buckets"
            );
        }
        removed
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    // Must run before taking an entry: `retain` locks every shard.
    fn maybe_sweep(&self, now: Instant) {
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last_sweep) < self.stale_after / 2 {
            return;
        }
        *last_sweep = now;
        drop(last_sweep);

        self.cleanup_stale();
    }
}

/// Middleware function for per-IP rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Without a peer address every request shares one bucket.
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if state.check(client) {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "rate limit exceeded" })),
        )
            .into_response()
    }
}
