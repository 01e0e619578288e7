//! Per-connection serving with slow-client limits.
//!
//! # Responsibilities
//! - Serve HTTP/1.1 and HTTP/2 on one accepted socket
//! - Close clients that are slow to send request headers
//! - Close keep-alive connections that sit idle
//! - Stop keep-alive and drain in-flight requests on shutdown
//!
//! # Design Decisions
//! - The peer address is attached as `ConnectInfo`, the same extension the
//!   rate limiter and request log read
//! - Idle means "no new request"; an idle close is graceful, so a long
//!   streamed response is never cut

use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::ConnectInfo, Router};
use hyper::{body::Incoming, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Time allowed for a client to send a complete request head.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest gap allowed between request body chunks.
pub const BODY_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// A connection with no new request for this long is closed.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Inbound connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub header_read_timeout: Duration,
    pub body_read_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            header_read_timeout: HEADER_READ_TIMEOUT,
            body_read_timeout: BODY_READ_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
        }
    }
}

/// Serve one accepted connection until it closes.
///
/// `draining` fires on server shutdown: keep-alive stops and the
/// connection closes once its in-flight requests finish.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    limits: ConnectionLimits,
    draining: CancellationToken,
) {
    let (activity, mut last_request) = watch::channel(());

    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        activity.send_replace(());
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(limits.header_read_timeout);

    let connection = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let idle = tokio::time::sleep(limits.idle_timeout);
    tokio::pin!(idle);

    let mut closing = false;
    let mut watching = true;

    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(err) = result {
                    tracing::debug!(peer = %peer, error = %err, "Connection closed with error");
                }
                break;
            }
            changed = last_request.changed(), if watching => match changed {
                Ok(()) => idle.as_mut().reset(tokio::time::Instant::now() + limits.idle_timeout),
                Err(_) => watching = false,
            },
            _ = &mut idle, if !closing => {
                tracing::debug!(peer = %peer, "Closing idle connection");
                connection.as_mut().graceful_shutdown();
                closing = true;
            }
            _ = draining.cancelled(), if !closing => {
                connection.as_mut().graceful_shutdown();
                closing = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn short_limits() -> ConnectionLimits {
        ConnectionLimits {
            header_read_timeout: Duration::from_millis(200),
            body_read_timeout: Duration::from_millis(200),
            idle_timeout: Duration::from_millis(300),
        }
    }

    /// Accept one connection and serve it with `limits`.
    async fn serve_one(limits: ConnectionLimits, draining: CancellationToken) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route(
            "/peer",
            get(|ConnectInfo(peer): ConnectInfo<SocketAddr>| async move { peer.ip().to_string() }),
        );

        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            serve_connection(stream, peer, router, limits, draining).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_peer_address_attached() {
        let addr = serve_one(ConnectionLimits::default(), CancellationToken::new()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /peer HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("127.0.0.1"), "{response}");
    }

    #[tokio::test]
    async fn test_slow_header_closes_connection() {
        let addr = serve_one(short_limits(), CancellationToken::new()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /peer HTTP/1.1\r\nHost: x\r\n").await.unwrap();

        let mut rest = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut rest)).await;
        assert!(closed.is_ok(), "connection left open with a partial request head");
    }

    #[tokio::test]
    async fn test_idle_keep_alive_connection_closed() {
        let addr = serve_one(short_limits(), CancellationToken::new()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /peer HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut response)).await;
        assert!(closed.is_ok(), "idle keep-alive connection left open");
        assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn test_draining_closes_idle_connection() {
        let draining = CancellationToken::new();
        let addr = serve_one(ConnectionLimits::default(), draining.clone()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /peer HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();

        let mut head = [0u8; 12];
        stream.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"HTTP/1.1 200");

        draining.cancel();
        let mut rest = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut rest)).await;
        assert!(closed.is_ok(), "draining left the connection open");
    }
}
