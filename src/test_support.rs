//! Shared test fixtures: an in-process mock upstream and forwarder builders.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, Uri},
    response::Response,
    Router,
};
use futures_util::stream;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::proxy::{Forwarder, ForwardingConfig};
use crate::security::headers::OUTBOUND_USER_AGENT;
use crate::security::{ApiKey, UpstreamBase};
use crate::upstream::UpstreamClient;

/// Body returned by the mock for ordinary calls.
pub const MOCK_BODY: &str = r#"{"result":"OK","data":{"search":[]}}"#;

/// One call as the mock upstream saw it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

type CallLog = Arc<Mutex<Vec<Captured>>>;

/// Mock upstream on `127.0.0.1:0`.
///
/// Path suffixes select behaviour: `/slow` sleeps 5 s, `/stream-fail` sends
/// one chunk then aborts, `/stream-stall` sends one chunk then never ends.
pub struct MockUpstream {
    pub addr: SocketAddr,
    calls: CallLog,
    task: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let calls = CallLog::default();
        let app = Router::new().fallback(handle).with_state(calls.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, calls, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> Vec<Captured> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Captured {
        self.calls().pop().expect("upstream was not called")
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(State(calls): State<CallLog>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let path = parts.uri.path().to_string();
    calls.lock().unwrap().push(Captured {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    });

    if path.ends_with("/slow") {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    let builder = Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .header("cache-control", "no-store")
        .header("set-cookie", "tracking=abc; Path=/")
        .header("x-debug-backend", "node-7")
        .header("server", "nginx");

    let body = if path.ends_with("/stream-fail") {
        let chunks = stream::unfold(0u8, |step| async move {
            match step {
                0 => Some((Ok(Bytes::from_static(b"partial")), 1)),
                1 => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Some((Err(io::Error::other("upstream died")), 2))
                }
                _ => None,
            }
        });
        Body::from_stream(chunks)
    } else if path.ends_with("/stream-stall") {
        let chunks = stream::unfold(0u8, |step| async move {
            match step {
                0 => Some((Ok::<_, io::Error>(Bytes::from_static(b"partial")), 1)),
                _ => std::future::pending().await,
            }
        });
        Body::from_stream(chunks)
    } else {
        Body::from(MOCK_BODY)
    };

    builder.body(body).unwrap()
}

/// Snapshot pointing at a plain-HTTP test upstream.
pub fn forwarding_config(base_url: &str, shared_key: Option<&str>, timeout: Duration) -> ForwardingConfig {
    ForwardingConfig {
        upstream: UpstreamBase::unchecked(base_url),
        shared_key: shared_key.and_then(|k| ApiKey::new(k)),
        timeout,
        idle_connections: 4,
        user_agent: HeaderValue::from_static(OUTBOUND_USER_AGENT),
    }
}

/// TLS config with an empty trust store. Test upstreams are plain HTTP and
/// the host may have no CA bundle.
pub fn empty_trust_tls() -> rustls::ClientConfig {
    rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(rustls::RootCertStore::empty())
        .with_no_client_auth()
}

/// Forwarder over a client that needs no system trust store.
pub fn forwarder(base_url: &str, shared_key: Option<&str>, timeout: Duration) -> Forwarder {
    Forwarder::with_client(
        forwarding_config(base_url, shared_key, timeout),
        UpstreamClient::with_tls_config(empty_trust_tls(), 4),
    )
}

/// Formatted log output captured for assertions.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's events here until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
