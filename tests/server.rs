//! Integration tests over real TCP connections.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_healthz_over_tcp() {
    let proxy = common::start_proxy(&common::base_config("K1")).await;

    let response = reqwest::get(proxy.url("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_status_reports_upstream_without_key() {
    let proxy = common::start_proxy(&common::base_config("TOP-SECRET")).await;

    let body: Value = reqwest::get(proxy.url("/proxy/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["upstream_url"], "https://vulners.com/");
    assert!(!body.to_string().contains("TOP-SECRET"));
}

#[tokio::test]
async fn test_missing_key_rejected_before_upstream() {
    let proxy = common::start_proxy(&common::base_config("")).await;

    let response = reqwest::get(proxy.url("/api/v3/search/lucene/?query=cve-2024-1234"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "API key required: set api_key in config or send X-Api-Key header"
    );
}

#[tokio::test]
async fn test_rate_limit_keys_on_peer_address() {
    let mut config = common::base_config("K1");
    config.server.rate_limit.enabled = true;
    config.server.rate_limit.requests_per_second = 1.0;
    let proxy = common::start_proxy(&config).await;
    let client = reqwest::Client::new();

    let first = client.get(proxy.url("/healthz")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // A spoofed forwarding header must not buy a fresh bucket.
    let second = client
        .get(proxy.url("/healthz"))
        .header("x-forwarded-for", "203.0.113.9")
        .header("x-real-ip", "203.0.113.9")
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let proxy = common::start_proxy(&common::base_config("K1")).await;

    let response = reqwest::get(proxy.url("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    proxy.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), proxy.task)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
