//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use tidepool_core::config::TidepoolConfig;
use tidepool_core::sources::{SourceRegistry, default_sources};
use tidepool_core::{Result, TidepoolError};
use tidepool_search::availability::{AvailabilityChecker, HttpProber, LinkProber};
use tidepool_search::providers::{CatalogProvider, DevelopmentProvider, MacCmsProvider};
use tidepool_search::types::CandidateVideo;
use tidepool_search::{SearchAggregator, SearchQuery};
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Path to a JSON source registry file
        #[arg(long)]
        registry: Option<PathBuf>,
        /// Serve canned catalog data instead of real backends
        #[arg(long)]
        demo: bool,
    },
    /// Search catalog sources and print confirmed-playable results
    Search {
        /// Query text
        query: String,
        /// Comma-separated source ids (defaults to all enabled sources)
        #[arg(long)]
        sources: Option<String>,
        /// Result page, 1-based
        #[arg(long, default_value = "1")]
        page: u32,
        /// Skip availability filtering
        #[arg(long)]
        no_check: bool,
        /// Path to a JSON source registry file
        #[arg(long)]
        registry: Option<PathBuf>,
        /// Use canned catalog data instead of real backends
        #[arg(long)]
        demo: bool,
    },
    /// Probe a single stream URL for availability
    CheckUrl {
        /// Stream URL to probe
        url: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Server {
            host,
            port,
            registry,
            demo,
        } => start_server(host, port, registry, demo).await,
        Commands::Search {
            query,
            sources,
            page,
            no_check,
            registry,
            demo,
        } => run_search(query, sources, page, no_check, registry, demo).await,
        Commands::CheckUrl { url } => check_url(url).await,
    }
}

/// Start the API server for search and relay access
///
/// # Errors
/// - `TidepoolError::Configuration` - Invalid bind address
/// - `TidepoolError::SourceRegistry` - Registry file could not be loaded
/// - `TidepoolError::Io` - Failed to bind the listener
pub async fn start_server(
    host: String,
    port: u16,
    registry_path: Option<PathBuf>,
    demo: bool,
) -> Result<()> {
    let mut config = TidepoolConfig::from_env();
    config.network.bind_address =
        format!("{host}:{port}")
            .parse()
            .map_err(|e| TidepoolError::Configuration {
                reason: format!("invalid bind address: {e}"),
            })?;

    // Rewritten playlist URIs must point back at this server unless an
    // explicit public origin was configured
    if std::env::var("TIDEPOOL_PUBLIC_ORIGIN").is_err() {
        config.proxy.public_origin = format!("http://{host}:{port}");
    }

    let registry = load_registry(registry_path)?;
    let provider = build_provider(&config, demo);

    println!("Starting Tidepool API server...");
    println!("URL: http://{host}:{port}");
    if demo {
        println!("Mode: Demo (using sample data)");
    } else {
        println!(
            "Mode: Production ({} enabled sources)",
            registry.enabled_sources().len()
        );
    }
    println!("{:-<50}", "");
    println!("Search:  POST http://{host}:{port}/api/search");
    println!("Stream:  POST http://{host}:{port}/api/search/stream");
    println!("Relay:   GET  http://{host}:{port}/proxy?url=<media url>");
    println!();
    println!("Press Ctrl+C to stop the server");

    info!(demo, "starting API server on {}", config.network.bind_address);
    tidepool_web::run_server(config, registry, provider).await
}

/// Search catalog sources from the command line
///
/// # Errors
/// - `TidepoolError::Search` - Query text or source list failed validation
/// - `TidepoolError::SourceRegistry` - Registry file could not be loaded
pub async fn run_search(
    query_text: String,
    sources: Option<String>,
    page: u32,
    no_check: bool,
    registry_path: Option<PathBuf>,
    demo: bool,
) -> Result<()> {
    let config = TidepoolConfig::from_env();
    let registry = load_registry(registry_path)?;
    let provider = build_provider(&config, demo);

    let source_ids = parse_source_list(sources.as_deref(), &registry);
    let query = SearchQuery::new(&query_text, source_ids, page)
        .map_err(TidepoolError::from_search_error)?;

    let aggregator = SearchAggregator::new(provider, &config.search);
    let aggregated = aggregator.search_batch(&query, &registry).await;
    info!(
        sources = aggregated.completed_count(),
        candidates = aggregated.total_candidates(),
        "aggregation finished"
    );

    println!(
        "Search results for '{}' (page {})",
        query.text(),
        query.page()
    );
    println!("{:-<60}", "");

    if no_check {
        for outcome in &aggregated.outcomes {
            match &outcome.error {
                Some(error) => println!(
                    "[{}] failed after {} ms: {error}",
                    outcome.source_id, outcome.response_time_ms
                ),
                None => {
                    println!(
                        "[{}] {} results in {} ms",
                        outcome.source_id,
                        outcome.candidates.len(),
                        outcome.response_time_ms
                    );
                    for candidate in &outcome.candidates {
                        print_candidate(candidate);
                    }
                }
            }
        }
        println!();
        println!(
            "{} candidates from {} sources (unverified)",
            aggregated.total_candidates(),
            aggregated.completed_count()
        );
        return Ok(());
    }

    let prober = Arc::new(HttpProber::new(config.search.probe_timeout));
    let checker = AvailabilityChecker::new(prober, config.search.availability_concurrency);
    let checked = aggregator
        .filter_available(&aggregated, &checker, &registry)
        .await;

    for group in &checked.per_source {
        let response_time = group
            .response_time_ms
            .map(|ms| format!("{ms} ms"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{}] {} playable results ({})",
            group.source,
            group.results.len(),
            response_time
        );
        for candidate in &group.results {
            print_candidate(candidate);
        }
    }
    println!();
    println!(
        "{} playable results across {} sources",
        checked.total_results,
        checked.source_stats.len()
    );

    Ok(())
}

/// Probe a single stream URL for availability
///
/// # Errors
/// Currently returns Ok; the probe outcome is printed, not raised
pub async fn check_url(url: String) -> Result<()> {
    let config = TidepoolConfig::from_env();
    let prober = HttpProber::new(config.search.probe_timeout);

    println!("Probing {url} ...");
    if prober.probe(&url).await {
        println!(
            "Available: stream answered within {:?}",
            config.search.probe_timeout
        );
    } else {
        println!("Unavailable: probe failed or timed out");
    }

    Ok(())
}

fn print_candidate(candidate: &CandidateVideo) {
    let extras: Vec<&str> = [
        candidate.category_name.as_deref(),
        candidate.remarks.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if extras.is_empty() {
        println!("  {} ({} episodes)", candidate.title, candidate.play_urls.len());
    } else {
        println!(
            "  {} [{}] ({} episodes)",
            candidate.title,
            extras.join(", "),
            candidate.play_urls.len()
        );
    }
}

fn load_registry(path: Option<PathBuf>) -> Result<SourceRegistry> {
    match path {
        Some(path) => Ok(SourceRegistry::from_json_file(&path)?),
        None => Ok(SourceRegistry::with_sources(default_sources())),
    }
}

fn build_provider(config: &TidepoolConfig, demo: bool) -> Arc<dyn CatalogProvider> {
    if demo {
        Arc::new(DevelopmentProvider::new())
    } else {
        Arc::new(MacCmsProvider::from_config(&config.network))
    }
}

/// Expands an optional comma-separated id list, defaulting to all
/// enabled sources from the registry.
fn parse_source_list(raw: Option<&str>, registry: &SourceRegistry) -> Vec<String> {
    match raw {
        Some(raw) => raw
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect(),
        None => registry
            .enabled_sources()
            .iter()
            .map(|source| source.id.clone())
            .collect(),
    }
}
