//! Integration tests for the media relay endpoint.
//!
//! Every test runs a live stub upstream and a full Tidepool server on
//! ephemeral ports and drives the relay over real HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::Value;
use tidepool_search::availability::StaticProber;
use tidepool_search::providers::DevelopmentProvider;

use crate::support;

async fn spawn_relay() -> SocketAddr {
    support::spawn_tidepool(
        support::registry(&["alpha"]),
        Arc::new(DevelopmentProvider::new()),
        Arc::new(StaticProber::default()),
    )
    .await
}

/// Upstream answering 503 for the first `failures` requests, then 200.
fn flaky_upstream(failures: usize) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        "/media.ts",
        get(move || {
            let counter = Arc::clone(&counter);
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt <= failures {
                    (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response()
                } else {
                    ([(header::CONTENT_TYPE, "video/mp2t")], "segment-bytes").into_response()
                }
            }
        }),
    );
    (router, hits)
}

#[tokio::test]
async fn test_relay_retries_transient_503_then_succeeds() {
    let (upstream, hits) = flaky_upstream(2);
    let upstream_addr = support::serve(upstream).await;
    let relay_addr = spawn_relay().await;

    let response = reqwest::get(format!(
        "http://{relay_addr}/proxy?url=http://{upstream_addr}/media.ts"
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "video/mp2t"
    );
    assert_eq!(response.text().await.unwrap(), "segment-bytes");
    // Two 503s plus the success, nothing more
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_relay_exhausts_retry_budget_with_single_json_error() {
    let (upstream, hits) = flaky_upstream(usize::MAX);
    let upstream_addr = support::serve(upstream).await;
    let relay_addr = spawn_relay().await;

    let response = reqwest::get(format!(
        "http://{relay_addr}/proxy?url=http://{upstream_addr}/media.ts"
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "proxy_failed");
    assert!(body["message"].as_str().unwrap().contains("5 attempts"));
    assert!(body["url"].as_str().unwrap().contains("/media.ts"));
    // The fixed budget, never more
    assert_eq!(hits.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_relay_does_not_retry_non_transient_status() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let upstream = Router::new().route(
        "/gone.ts",
        get(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::NOT_FOUND
            }
        }),
    );
    let upstream_addr = support::serve(upstream).await;
    let relay_addr = spawn_relay().await;

    let response = reqwest::get(format!(
        "http://{relay_addr}/proxy?url=http://{upstream_addr}/gone.ts"
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("404"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_relay_rewrites_playlist_and_serves_rewritten_segment() {
    let upstream = Router::new()
        .route(
            "/stream/index.m3u8",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
                    "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n#EXTINF:6.0,\nseg001.ts\n#EXT-X-ENDLIST",
                )
            }),
        )
        .route(
            "/stream/seg001.ts",
            get(|| async { ([(header::CONTENT_TYPE, "video/mp2t")], "ts-payload") }),
        );
    let upstream_addr = support::serve(upstream).await;
    let relay_addr = spawn_relay().await;

    let response = reqwest::get(format!(
        "http://{relay_addr}/proxy?url=http://{upstream_addr}/stream/index.m3u8"
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("mpegurl")
    );

    let body = response.text().await.unwrap();
    let lines: Vec<&str> = body.split('\n').collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "#EXTM3U");

    let expected_key = format!(
        "#EXT-X-KEY:METHOD=AES-128,URI=\"http://{relay_addr}/proxy?url={}\"",
        urlencoding::encode(&format!("http://{upstream_addr}/stream/key.bin"))
    );
    assert_eq!(lines[1], expected_key);

    let expected_segment = format!(
        "http://{relay_addr}/proxy?url={}",
        urlencoding::encode(&format!("http://{upstream_addr}/stream/seg001.ts"))
    );
    assert_eq!(lines[3], expected_segment);

    // The rewritten segment line is itself a working relay URL
    let segment = reqwest::get(lines[3]).await.unwrap();
    assert_eq!(segment.status(), StatusCode::OK);
    assert_eq!(segment.text().await.unwrap(), "ts-payload");
}

#[tokio::test]
async fn test_relay_passthrough_copies_safe_headers_and_adds_cors() {
    let upstream = Router::new().route(
        "/blob.bin",
        get(|| async {
            (
                [
                    (header::CONTENT_TYPE, "application/octet-stream"),
                    (header::HeaderName::from_static("x-upstream-tag"), "tide"),
                ],
                "opaque-bytes",
            )
        }),
    );
    let upstream_addr = support::serve(upstream).await;
    let relay_addr = spawn_relay().await;

    let response = reqwest::get(format!(
        "http://{relay_addr}/proxy?url=http://{upstream_addr}/blob.bin"
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-upstream-tag").unwrap(),
        "tide"
    );
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    assert_eq!(response.text().await.unwrap(), "opaque-bytes");
}

#[tokio::test]
async fn test_relay_rejects_missing_and_invalid_url() {
    let relay_addr = spawn_relay().await;

    let missing = reqwest::get(format!("http://{relay_addr}/proxy"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "missing_url");

    let invalid = reqwest::get(format!("http://{relay_addr}/proxy?url=not-a-url"))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let body: Value = invalid.json().await.unwrap();
    assert_eq!(body["error"], "invalid_url");
}

#[tokio::test]
async fn test_relay_preflight_answers_204_with_cors_allowances() {
    let relay_addr = spawn_relay().await;

    let client = reqwest::Client::new();
    let response = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{relay_addr}/proxy"),
        )
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "GET, OPTIONS"
    );
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
        "Content-Type, Authorization"
    );
}
