//! API server wiring for Tidepool
//!
//! Builds the axum router over a shared application state: the source
//! registry snapshot, the search aggregator, the availability checker and
//! the media relay. All endpoints are JSON or SSE; there is no HTML
//! surface here.

use std::sync::Arc;

use axum::Router;
use axum::response::Json;
use axum::routing::{get, post};
use serde_json::json;
use tidepool_core::config::TidepoolConfig;
use tidepool_core::proxy::ProxyFetcher;
use tidepool_core::sources::SourceRegistry;
use tidepool_core::{Result, TidepoolError};
use tidepool_search::availability::{AvailabilityChecker, HttpProber, LinkProber};
use tidepool_search::providers::CatalogProvider;
use tidepool_search::SearchAggregator;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{proxy_media, proxy_preflight, search_batch, search_batch_query, search_stream};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: TidepoolConfig,
    pub registry: Arc<SourceRegistry>,
    pub aggregator: Arc<SearchAggregator>,
    pub checker: Arc<AvailabilityChecker>,
    pub proxy: Arc<ProxyFetcher>,
}

impl AppState {
    /// Creates application state with the production HTTP prober.
    ///
    /// # Errors
    /// - `TidepoolError::Proxy` - Relay client construction failed
    pub fn new(
        config: TidepoolConfig,
        registry: SourceRegistry,
        provider: Arc<dyn CatalogProvider>,
    ) -> Result<Self> {
        let prober = Arc::new(HttpProber::new(config.search.probe_timeout));
        Self::with_prober(config, registry, provider, prober)
    }

    /// Creates application state with an explicit link prober.
    ///
    /// Tests substitute deterministic probers here.
    ///
    /// # Errors
    /// - `TidepoolError::Proxy` - Relay client construction failed
    pub fn with_prober(
        config: TidepoolConfig,
        registry: SourceRegistry,
        provider: Arc<dyn CatalogProvider>,
        prober: Arc<dyn LinkProber>,
    ) -> Result<Self> {
        let aggregator = Arc::new(SearchAggregator::new(provider, &config.search));
        let checker = Arc::new(AvailabilityChecker::new(
            prober,
            config.search.availability_concurrency,
        ));
        let proxy = Arc::new(ProxyFetcher::new(config.proxy.clone())?);

        Ok(Self {
            config,
            registry: Arc::new(registry),
            aggregator,
            checker,
            proxy,
        })
    }
}

/// Builds the full route table over the given state.
///
/// The search API gets a permissive CORS layer; the proxy endpoint
/// manages its own CORS headers because players also preflight it.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/search", get(search_batch_query).post(search_batch))
        .route("/api/search/stream", post(search_stream))
        .layer(CorsLayer::permissive());

    Router::new()
        .merge(api)
        .route("/proxy", get(proxy_media).options(proxy_preflight))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Binds the configured address and serves requests until shutdown.
///
/// # Errors
/// - `TidepoolError::Proxy` - Relay client construction failed
/// - `TidepoolError::Io` - Binding or serving the listener failed
pub async fn run_server(
    config: TidepoolConfig,
    registry: SourceRegistry,
    provider: Arc<dyn CatalogProvider>,
) -> Result<()> {
    let bind_address = config.network.bind_address;
    let state = AppState::new(config, registry, provider)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(TidepoolError::Io)?;
    info!("Tidepool API server listening on http://{bind_address}");
    axum::serve(listener, app).await.map_err(TidepoolError::Io)?;
    Ok(())
}
