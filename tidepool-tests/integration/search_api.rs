//! Integration tests for the aggregated search API.
//!
//! Runs the real router over the development catalog provider and a
//! deterministic prober, exercising the batch envelope and the SSE event
//! protocol end to end.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Value, json};
use tidepool_search::availability::StaticProber;
use tidepool_search::providers::DevelopmentProvider;

use crate::support;

// Primary play URLs the development provider emits for the query "tide"
const EPISODE_URL: &str = "https://media.dev.invalid/tide/e1/index.m3u8";
const MOVIE_URL: &str = "https://media.dev.invalid/tide/movie/index.m3u8";

async fn spawn_search(reachable: &[&str]) -> SocketAddr {
    support::spawn_tidepool(
        support::registry(&["alpha", "beta"]),
        Arc::new(DevelopmentProvider::new()),
        Arc::new(StaticProber::new(reachable)),
    )
    .await
}

fn search_body(query: &str, sources: &[&str]) -> Value {
    json!({ "query": query, "sources": sources, "page": 1 })
}

#[tokio::test]
async fn test_batch_search_envelope_shape() {
    let addr = spawn_search(&[EPISODE_URL, MOVIE_URL]).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/search"))
        .json(&search_body("tide", &["alpha", "beta"]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["query"], "tide");
    assert_eq!(body["page"], 1);
    // Two sources, two confirmed candidates each
    assert_eq!(body["total_results"], 4);
    assert_eq!(body["sources"].as_array().unwrap().len(), 2);
    for group in body["sources"].as_array().unwrap() {
        assert_eq!(group["results"].as_array().unwrap().len(), 2);
        assert!(group["response_time_ms"].is_u64());
    }

    let stats = body["source_stats"].as_array().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0]["source_id"], "alpha");
    assert_eq!(stats[0]["source_name"], "Source alpha");
    assert_eq!(stats[0]["count"], 2);
    assert_eq!(stats[1]["count"], 2);
}

#[tokio::test]
async fn test_batch_search_counts_reflect_filtered_set() {
    // Only the episode URL answers; each source's movie entry is dead
    let addr = spawn_search(&[EPISODE_URL]).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/search"))
        .json(&search_body("tide", &["alpha", "beta"]))
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_results"], 2);

    for stat in body["source_stats"].as_array().unwrap() {
        assert_eq!(stat["count"], 1);
    }
    for group in body["sources"].as_array().unwrap() {
        let results = group["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert!(
            results[0]["id"]
                .as_str()
                .unwrap()
                .ends_with("-1-1")
        );
    }
}

#[tokio::test]
async fn test_batch_search_rejects_invalid_input_before_io() {
    let addr = spawn_search(&[]).await;
    let client = reqwest::Client::new();

    let missing_query = client
        .post(format!("http://{addr}/api/search"))
        .json(&json!({ "sources": ["alpha"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_query.status(), StatusCode::BAD_REQUEST);
    let body: Value = missing_query.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("query"));

    let empty_sources = client
        .post(format!("http://{addr}/api/search"))
        .json(&json!({ "query": "tide", "sources": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_sources.status(), StatusCode::BAD_REQUEST);

    let unknown_sources = client
        .post(format!("http://{addr}/api/search"))
        .json(&search_body("tide", &["nope"]))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_sources.status(), StatusCode::BAD_REQUEST);
    let body: Value = unknown_sources.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("No valid sources"));
}

#[tokio::test]
async fn test_batch_search_get_variant() {
    let addr = spawn_search(&[EPISODE_URL, MOVIE_URL]).await;

    let response = reqwest::get(format!(
        "http://{addr}/api/search?q=tide&sources=alpha&page=1"
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["total_results"], 2);
    assert_eq!(body["source_stats"].as_array().unwrap().len(), 1);
}

fn parse_sse(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

#[tokio::test]
async fn test_streaming_search_event_protocol() {
    let addr = spawn_search(&[EPISODE_URL, MOVIE_URL]).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/search/stream"))
        .json(&search_body("tide", &["alpha", "beta"]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let events = parse_sse(&response.text().await.unwrap());
    assert!(!events.is_empty());

    assert_eq!(events[0]["type"], "start");
    assert_eq!(events[0]["total_sources"], 2);

    let videos: Vec<&Value> = events.iter().filter(|e| e["type"] == "videos").collect();
    assert_eq!(videos.len(), 2);
    for event in &videos {
        assert_eq!(event["videos"].as_array().unwrap().len(), 2);
    }

    let progress: Vec<&Value> = events.iter().filter(|e| e["type"] == "progress").collect();
    assert_eq!(progress.len(), 2);

    let completes: Vec<&Value> = events.iter().filter(|e| e["type"] == "complete").collect();
    assert_eq!(completes.len(), 1);

    let last = events.last().unwrap();
    assert_eq!(last["type"], "complete");
    assert_eq!(last["total_sources"], 2);
    assert_eq!(last["total_videos_found"], 4);
}

#[tokio::test]
async fn test_streaming_search_invalid_input_emits_single_error_event() {
    let addr = spawn_search(&[]).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/search/stream"))
        .json(&json!({ "query": "  ", "sources": ["alpha"] }))
        .send()
        .await
        .unwrap();

    let events = parse_sse(&response.text().await.unwrap());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
    assert!(events[0]["message"].as_str().unwrap().contains("query"));
}
