//! Shared helpers for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tidepool_core::config::TidepoolConfig;
use tidepool_core::sources::{SourceDescriptor, SourceRegistry};
use tidepool_search::availability::LinkProber;
use tidepool_search::providers::CatalogProvider;
use tidepool_web::AppState;

/// Serves a router on an ephemeral port, returning its address.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Spawns a full Tidepool server whose playlist rewrites point back at
/// its own ephemeral address.
pub async fn spawn_tidepool(
    registry: SourceRegistry,
    provider: Arc<dyn CatalogProvider>,
    prober: Arc<dyn LinkProber>,
) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = TidepoolConfig::for_testing();
    config.proxy.public_origin = format!("http://{addr}");

    let state = AppState::with_prober(config, registry, provider, prober).unwrap();
    let router = tidepool_web::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Builds a registry of enabled test sources with the given ids.
pub fn registry(ids: &[&str]) -> SourceRegistry {
    SourceRegistry::with_sources(
        ids.iter()
            .enumerate()
            .map(|(index, id)| SourceDescriptor {
                id: (*id).to_string(),
                name: format!("Source {id}"),
                base_url: format!("https://{id}.test.invalid/api.php/provide/vod"),
                enabled: true,
                priority: index as u32 + 1,
            })
            .collect(),
    )
}
