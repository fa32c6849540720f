//! Search API handlers: batch aggregation and SSE streaming.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Deserialize;
use serde_json::json;
use tidepool_search::{SearchEvent, SearchQuery};
use tracing::info;

use crate::server::AppState;

/// Search request body shared by the batch and streaming endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

/// `POST /api/search` - batch aggregation with availability filtering.
pub async fn search_batch(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    match validate(&state, &request) {
        Ok(query) => run_batch(state, query).await,
        Err(message) => error_envelope(StatusCode::BAD_REQUEST, &message),
    }
}

/// `GET /api/search?q=...&sources=a,b&page=1` - batch aggregation for
/// simple clients. Omitting `sources` searches all enabled sources from
/// the registry snapshot.
pub async fn search_batch_query(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = params.get("q").or_else(|| params.get("query")).cloned();
    let sources = match params.get("sources") {
        Some(raw) => raw
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect(),
        None => state
            .registry
            .enabled_sources()
            .iter()
            .map(|source| source.id.clone())
            .collect(),
    };
    let page = params
        .get("page")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(default_page);

    let request = SearchRequest {
        query,
        sources,
        page,
    };
    match validate(&state, &request) {
        Ok(query) => run_batch(state, query).await,
        Err(message) => error_envelope(StatusCode::BAD_REQUEST, &message),
    }
}

/// `POST /api/search/stream` - streaming aggregation over SSE.
///
/// Emits `start`, interleaved `videos`/`progress`, then one `complete`.
/// Invalid input produces a single `error` event instead of an HTTP
/// failure so event-stream consumers see one uniform frame shape.
pub async fn search_stream(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Sse<BoxStream<'static, Result<Event, axum::Error>>> {
    let events: BoxStream<'static, SearchEvent> = match validate(&state, &request) {
        Ok(query) => {
            let receiver = state.aggregator.search_streaming(&query, &state.registry);
            stream::unfold(receiver, |mut receiver| async move {
                receiver.recv().await.map(|event| (event, receiver))
            })
            .boxed()
        }
        Err(message) => stream::once(async move { SearchEvent::Error { message } }).boxed(),
    };

    Sse::new(
        events
            .map(|event| Event::default().json_data(&event))
            .boxed(),
    )
}

/// Rejects invalid input before any I/O happens.
fn validate(state: &AppState, request: &SearchRequest) -> Result<SearchQuery, String> {
    let text = request.query.as_deref().unwrap_or_default();
    if text.trim().is_empty() {
        return Err("Invalid or missing query parameter".to_string());
    }
    if request.sources.is_empty() {
        return Err("At least one source must be specified".to_string());
    }
    if state.registry.resolve(&request.sources).is_empty() {
        return Err("No valid sources found".to_string());
    }

    SearchQuery::new(text, request.sources.clone(), request.page).map_err(|error| error.to_string())
}

async fn run_batch(state: AppState, query: SearchQuery) -> Response {
    let aggregated = state.aggregator.search_batch(&query, &state.registry).await;
    let checked = state
        .aggregator
        .filter_available(&aggregated, &state.checker, &state.registry)
        .await;

    info!(
        query = query.text(),
        fetched = aggregated.total_candidates(),
        playable = checked.total_results,
        "batch search complete"
    );

    Json(json!({
        "success": true,
        "query": query.text(),
        "page": query.page(),
        "sources": checked.per_source,
        "total_results": checked.total_results,
        "source_stats": checked.source_stats,
    }))
    .into_response()
}

fn error_envelope(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tidepool_core::config::TidepoolConfig;
    use tidepool_core::sources::{SourceDescriptor, SourceRegistry};
    use tidepool_search::DevelopmentProvider;
    use tidepool_search::availability::StaticProber;

    use super::*;

    fn test_state() -> AppState {
        let registry = SourceRegistry::with_sources(vec![SourceDescriptor {
            id: "alpha".to_string(),
            name: "Alpha".to_string(),
            base_url: "https://alpha.example.com/api.php/provide/vod".to_string(),
            enabled: true,
            priority: 1,
        }]);
        AppState::with_prober(
            TidepoolConfig::for_testing(),
            registry,
            Arc::new(DevelopmentProvider::new()),
            Arc::new(StaticProber::default()),
        )
        .unwrap()
    }

    fn request(query: Option<&str>, sources: &[&str], page: u32) -> SearchRequest {
        SearchRequest {
            query: query.map(str::to_string),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            page,
        }
    }

    #[test]
    fn test_validate_accepts_known_source() {
        let state = test_state();
        let query = validate(&state, &request(Some(" tide "), &["alpha"], 1)).unwrap();
        assert_eq!(query.text(), "tide");
        assert_eq!(query.source_ids(), ["alpha"]);
    }

    #[test]
    fn test_validate_rejects_missing_or_blank_query() {
        let state = test_state();
        assert!(validate(&state, &request(None, &["alpha"], 1)).is_err());
        assert!(validate(&state, &request(Some("   "), &["alpha"], 1)).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_source_list() {
        let state = test_state();
        let error = validate(&state, &request(Some("tide"), &[], 1)).unwrap_err();
        assert!(error.contains("At least one source"));
    }

    #[test]
    fn test_validate_rejects_unknown_sources_only() {
        let state = test_state();
        let error = validate(&state, &request(Some("tide"), &["nope", "nada"], 1)).unwrap_err();
        assert!(error.contains("No valid sources"));
    }

    #[test]
    fn test_validate_rejects_page_zero() {
        let state = test_state();
        assert!(validate(&state, &request(Some("tide"), &["alpha"], 0)).is_err());
    }
}
