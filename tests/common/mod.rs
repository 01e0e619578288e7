//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use vulners_proxy::config::ProxyConfig;
use vulners_proxy::http::HttpServer;
use vulners_proxy::lifecycle::Shutdown;
use vulners_proxy::proxy::{Forwarder, ForwardingConfig};
use vulners_proxy::upstream::UpstreamClient;

/// A proxy served on an ephemeral loopback port.
#[allow(dead_code)]
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config pointing at the real upstream; tests never let a call get that far.
pub fn base_config(api_key: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.base_url = "https://vulners.com".to_string();
    config.vulners.api_key = api_key.to_string();
    config.apply_defaults();
    config
}

/// Empty trust store: integration hosts may lack a CA bundle.
fn tls_config() -> rustls::ClientConfig {
    rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(rustls::RootCertStore::empty())
        .with_no_client_auth()
}

/// Start the full server stack for `config`.
pub async fn start_proxy(config: &ProxyConfig) -> RunningProxy {
    let forwarding = ForwardingConfig::from_config(config).unwrap();
    let client = UpstreamClient::with_tls_config(tls_config(), forwarding.idle_connections);
    let forwarder = Forwarder::with_client(forwarding, client);
    let server = HttpServer::new(config, forwarder, None);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn(server.run(listener, rx));

    RunningProxy { addr, shutdown, task }
}
