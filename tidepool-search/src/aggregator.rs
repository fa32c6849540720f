//! Parallel search aggregation across catalog sources.
//!
//! One aggregation run fans a query out to every selected source
//! concurrently; no source waits on, or can abort, another. Results come
//! back either as a single combined structure (batch) or as an event
//! sequence that surfaces each source's videos the moment its own query
//! resolves (streaming), so one hung backend never delays the rest.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tidepool_core::config::SearchConfig;
use tidepool_core::sources::{SourceDescriptor, SourceRegistry};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::availability::AvailabilityChecker;
use crate::providers::CatalogProvider;
use crate::types::{
    AggregatedSearch, CandidateVideo, CheckedSearch, SearchEvent, SearchQuery, SourceResults,
    SourceSearchOutcome, SourceStat,
};

/// Orchestrates concurrent catalog queries across a registry snapshot.
#[derive(Debug, Clone)]
pub struct SearchAggregator {
    provider: Arc<dyn CatalogProvider>,
    source_timeout: Duration,
}

impl SearchAggregator {
    /// Creates an aggregator around one provider implementation.
    pub fn new(provider: Arc<dyn CatalogProvider>, config: &SearchConfig) -> Self {
        Self {
            provider,
            source_timeout: config.source_timeout,
        }
    }

    /// Runs a batch aggregation: every resolved source is queried
    /// concurrently and the call returns once all of them finished,
    /// successfully or not. Exactly one outcome per resolved source.
    pub async fn search_batch(
        &self,
        query: &SearchQuery,
        registry: &SourceRegistry,
    ) -> AggregatedSearch {
        let sources = registry.resolve(query.source_ids());
        debug!(
            query = query.text(),
            sources = sources.len(),
            page = query.page(),
            "starting batch aggregation"
        );

        let mut handles = Vec::with_capacity(sources.len());
        for source in sources {
            let provider = Arc::clone(&self.provider);
            let text = query.text().to_string();
            let page = query.page();
            let deadline = self.source_timeout;
            let source_id = source.id.clone();
            let handle =
                tokio::spawn(
                    async move { query_one_source(provider, source, text, page, deadline).await },
                );
            handles.push((source_id, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (source_id, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => outcomes.push(SourceSearchOutcome {
                    source_id,
                    candidates: Vec::new(),
                    response_time_ms: 0,
                    error: Some(format!("source task failed: {join_error}")),
                }),
            }
        }

        AggregatedSearch {
            query: query.text().to_string(),
            page: query.page(),
            outcomes,
        }
    }

    /// Runs a streaming aggregation, returning the run's event channel.
    ///
    /// Emits `Start`, then per-source `Videos` (in arrival order) and
    /// `Progress` events, then exactly one `Complete` before the channel
    /// closes. Dropping the receiver cancels the run's event delivery.
    pub fn search_streaming(
        &self,
        query: &SearchQuery,
        registry: &SourceRegistry,
    ) -> mpsc::Receiver<SearchEvent> {
        let sources = registry.resolve(query.source_ids());
        let provider = Arc::clone(&self.provider);
        let text = query.text().to_string();
        let page = query.page();
        let deadline = self.source_timeout;
        let (event_tx, event_rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let total_sources = sources.len();
            if event_tx
                .send(SearchEvent::Start { total_sources })
                .await
                .is_err()
            {
                return;
            }

            let (outcome_tx, mut outcome_rx) =
                mpsc::channel::<SourceSearchOutcome>(total_sources.max(1));
            for source in sources {
                let provider = Arc::clone(&provider);
                let text = text.clone();
                let outcome_tx = outcome_tx.clone();
                tokio::spawn(async move {
                    let outcome = query_one_source(provider, source, text, page, deadline).await;
                    let _ = outcome_tx.send(outcome).await;
                });
            }
            drop(outcome_tx);

            // Counters live on this task alone; source tasks only report
            // outcomes through the channel
            let mut completed_sources = 0usize;
            let mut total_videos_found = 0usize;

            while let Some(outcome) = outcome_rx.recv().await {
                completed_sources += 1;

                if !outcome.candidates.is_empty() {
                    total_videos_found += outcome.candidates.len();
                    let videos = SearchEvent::Videos {
                        videos: outcome.candidates,
                        source: outcome.source_id,
                        completed_sources,
                        total_sources,
                    };
                    if event_tx.send(videos).await.is_err() {
                        return;
                    }
                }

                let progress = SearchEvent::Progress {
                    completed_sources,
                    total_sources,
                    total_videos_found,
                };
                if event_tx.send(progress).await.is_err() {
                    return;
                }
            }

            debug!(
                completed_sources,
                total_videos_found, "streaming aggregation complete"
            );
            let _ = event_tx
                .send(SearchEvent::Complete {
                    total_videos_found,
                    total_sources,
                })
                .await;
        });

        event_rx
    }

    /// Batch post-processing: drops unreachable candidates and regroups
    /// the survivors by source.
    ///
    /// Per-source counts are recomputed from the filtered set, so the
    /// stats reflect confirmed-playable entries rather than raw fetch
    /// counts. Sources whose results were all filtered out keep a zero
    /// stat entry but no result group.
    pub async fn filter_available(
        &self,
        aggregated: &AggregatedSearch,
        checker: &AvailabilityChecker,
        registry: &SourceRegistry,
    ) -> CheckedSearch {
        let survivors = checker.check_many(aggregated.all_candidates()).await;
        let surviving: std::collections::HashSet<(&str, &str)> = survivors
            .iter()
            .map(|c| (c.source_id.as_str(), c.id.as_str()))
            .collect();

        let mut per_source = Vec::new();
        let mut source_stats = Vec::with_capacity(aggregated.outcomes.len());
        let mut total_results = 0usize;

        for outcome in &aggregated.outcomes {
            let results: Vec<CandidateVideo> = outcome
                .candidates
                .iter()
                .filter(|c| surviving.contains(&(c.source_id.as_str(), c.id.as_str())))
                .cloned()
                .collect();

            source_stats.push(SourceStat {
                source_id: outcome.source_id.clone(),
                source_name: registry.display_name(&outcome.source_id),
                count: results.len(),
            });
            total_results += results.len();

            if !results.is_empty() {
                per_source.push(SourceResults {
                    source: outcome.source_id.clone(),
                    results,
                    response_time_ms: Some(outcome.response_time_ms),
                });
            }
        }

        CheckedSearch {
            per_source,
            total_results,
            source_stats,
        }
    }
}

/// Queries one source under its deadline, converting every failure mode
/// into a non-fatal outcome.
async fn query_one_source(
    provider: Arc<dyn CatalogProvider>,
    source: SourceDescriptor,
    text: String,
    page: u32,
    deadline: Duration,
) -> SourceSearchOutcome {
    let started = Instant::now();
    let result = tokio::time::timeout(deadline, provider.search(&source, &text, page)).await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(candidates)) => {
            debug!(
                source = %source.id,
                count = candidates.len(),
                response_time_ms,
                "source query completed"
            );
            SourceSearchOutcome {
                source_id: source.id,
                candidates,
                response_time_ms,
                error: None,
            }
        }
        Ok(Err(error)) => {
            warn!(source = %source.id, %error, "source query failed");
            SourceSearchOutcome {
                source_id: source.id,
                candidates: Vec::new(),
                response_time_ms,
                error: Some(error.to_string()),
            }
        }
        Err(_) => {
            warn!(source = %source.id, ?deadline, "source query timed out");
            SourceSearchOutcome {
                source_id: source.id,
                candidates: Vec::new(),
                response_time_ms,
                error: Some("source timed out".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tidepool_core::sources::SourceDescriptor;

    use super::*;
    use crate::availability::StaticProber;
    use crate::providers::MockProvider;

    fn registry(ids: &[&str]) -> SourceRegistry {
        SourceRegistry::with_sources(
            ids.iter()
                .enumerate()
                .map(|(index, id)| SourceDescriptor {
                    id: (*id).to_string(),
                    name: format!("Source {id}"),
                    base_url: format!("https://{id}.example.com/api.php/provide/vod"),
                    enabled: true,
                    priority: index as u32 + 1,
                })
                .collect(),
        )
    }

    fn aggregator(provider: MockProvider) -> SearchAggregator {
        SearchAggregator::new(Arc::new(provider), &SearchConfig::default())
    }

    fn query(ids: &[&str]) -> SearchQuery {
        SearchQuery::new("tide", ids.iter().map(|s| s.to_string()).collect(), 1).unwrap()
    }

    #[tokio::test]
    async fn test_batch_produces_one_outcome_per_source_under_failures() {
        let provider = MockProvider::new()
            .with_videos(
                "alpha",
                vec![MockProvider::video(
                    "alpha",
                    "1",
                    "Tide",
                    "https://cdn.example.com/1.m3u8",
                )],
            )
            .with_failure("beta", "connection refused")
            .with_failure("gamma", "bad gateway");

        let aggregated = aggregator(provider)
            .search_batch(&query(&["alpha", "beta", "gamma"]), &registry(&["alpha", "beta", "gamma"]))
            .await;

        assert_eq!(aggregated.completed_count(), 3);
        assert!(aggregated.outcome_for("alpha").unwrap().error.is_none());
        assert!(aggregated.outcome_for("beta").unwrap().error.is_some());
        assert!(aggregated.outcome_for("gamma").unwrap().error.is_some());
        assert_eq!(aggregated.total_candidates(), 1);
    }

    #[tokio::test]
    async fn test_batch_preserves_upstream_order_within_a_source() {
        let videos = vec![
            MockProvider::video("alpha", "3", "Third", "https://cdn.example.com/3.m3u8"),
            MockProvider::video("alpha", "1", "First", "https://cdn.example.com/1.m3u8"),
            MockProvider::video("alpha", "2", "Second", "https://cdn.example.com/2.m3u8"),
        ];
        let provider = MockProvider::new().with_videos("alpha", videos.clone());

        let aggregated = aggregator(provider)
            .search_batch(&query(&["alpha"]), &registry(&["alpha"]))
            .await;

        assert_eq!(aggregated.outcome_for("alpha").unwrap().candidates, videos);
    }

    #[tokio::test]
    async fn test_batch_drops_unknown_source_ids_silently() {
        let provider = MockProvider::new().with_videos(
            "alpha",
            vec![MockProvider::video(
                "alpha",
                "1",
                "Tide",
                "https://cdn.example.com/1.m3u8",
            )],
        );

        let aggregated = aggregator(provider)
            .search_batch(&query(&["alpha", "unknown"]), &registry(&["alpha"]))
            .await;

        assert_eq!(aggregated.completed_count(), 1);
        assert!(aggregated.outcome_for("unknown").is_none());
    }

    #[tokio::test]
    async fn test_batch_times_out_hung_source_without_blocking_others() {
        let provider = MockProvider::new()
            .with_videos(
                "slow",
                vec![MockProvider::video(
                    "slow",
                    "1",
                    "Late",
                    "https://cdn.example.com/late.m3u8",
                )],
            )
            .with_delay("slow", Duration::from_secs(60))
            .with_videos(
                "fast",
                vec![MockProvider::video(
                    "fast",
                    "2",
                    "Early",
                    "https://cdn.example.com/early.m3u8",
                )],
            );

        let mut config = SearchConfig::default();
        config.source_timeout = Duration::from_millis(100);
        let aggregator = SearchAggregator::new(Arc::new(provider), &config);

        let aggregated = aggregator
            .search_batch(&query(&["slow", "fast"]), &registry(&["slow", "fast"]))
            .await;

        assert_eq!(aggregated.completed_count(), 2);
        assert_eq!(
            aggregated.outcome_for("slow").unwrap().error.as_deref(),
            Some("source timed out")
        );
        assert!(aggregated.outcome_for("fast").unwrap().error.is_none());
    }

    #[tokio::test]
    async fn test_streaming_emits_exactly_one_complete_with_full_count() {
        let provider = MockProvider::new()
            .with_videos(
                "alpha",
                vec![MockProvider::video(
                    "alpha",
                    "1",
                    "Tide",
                    "https://cdn.example.com/1.m3u8",
                )],
            )
            .with_failure("beta", "connection refused");

        let mut rx = aggregator(provider)
            .search_streaming(&query(&["alpha", "beta"]), &registry(&["alpha", "beta"]));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.first(), Some(&SearchEvent::Start { total_sources: 2 }));

        let completes: Vec<&SearchEvent> = events
            .iter()
            .filter(|e| matches!(e, SearchEvent::Complete { .. }))
            .collect();
        assert_eq!(completes.len(), 1);
        assert_eq!(
            events.last(),
            Some(&SearchEvent::Complete {
                total_videos_found: 1,
                total_sources: 2
            })
        );

        // Every source completion produced a progress event
        let progress_count = events
            .iter()
            .filter(|e| matches!(e, SearchEvent::Progress { .. }))
            .count();
        assert_eq!(progress_count, 2);
    }

    #[tokio::test]
    async fn test_streaming_fast_source_not_blocked_by_slow_source() {
        let provider = MockProvider::new()
            .with_videos(
                "slow",
                vec![MockProvider::video(
                    "slow",
                    "1",
                    "Late",
                    "https://cdn.example.com/late.m3u8",
                )],
            )
            .with_delay("slow", Duration::from_millis(300))
            .with_videos(
                "fast",
                vec![MockProvider::video(
                    "fast",
                    "2",
                    "Early",
                    "https://cdn.example.com/early.m3u8",
                )],
            );

        let mut rx = aggregator(provider)
            .search_streaming(&query(&["slow", "fast"]), &registry(&["slow", "fast"]));

        // Skip Start, then the first videos event must come from the fast
        // source while the slow one is still in flight
        let start = rx.recv().await.unwrap();
        assert!(matches!(start, SearchEvent::Start { .. }));

        let first_videos = loop {
            match rx.recv().await.unwrap() {
                SearchEvent::Videos { source, .. } => break source,
                SearchEvent::Progress { .. } => continue,
                other => panic!("unexpected event before first videos: {other:?}"),
            }
        };
        assert_eq!(first_videos, "fast");

        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_streaming_all_ids_unknown_still_completes() {
        let provider = MockProvider::new();
        let mut rx = aggregator(provider)
            .search_streaming(&query(&["unknown"]), &registry(&["alpha"]));

        assert_eq!(
            rx.recv().await,
            Some(SearchEvent::Start { total_sources: 0 })
        );
        assert_eq!(
            rx.recv().await,
            Some(SearchEvent::Complete {
                total_videos_found: 0,
                total_sources: 0
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_filter_available_recomputes_counts_from_filtered_set() {
        let provider = MockProvider::new()
            .with_videos(
                "alpha",
                vec![
                    MockProvider::video("alpha", "1", "Alive", "https://cdn.example.com/ok.m3u8"),
                    MockProvider::video("alpha", "2", "Dead", "https://cdn.example.com/dead.m3u8"),
                ],
            )
            .with_videos(
                "beta",
                vec![MockProvider::video(
                    "beta",
                    "3",
                    "Also Dead",
                    "https://cdn.example.com/gone.m3u8",
                )],
            );

        let aggregator = aggregator(provider);
        let registry = registry(&["alpha", "beta"]);
        let aggregated = aggregator
            .search_batch(&query(&["alpha", "beta"]), &registry)
            .await;

        let prober = StaticProber::new(&["https://cdn.example.com/ok.m3u8"]);
        let checker = AvailabilityChecker::new(Arc::new(prober), 8);

        let checked = aggregator
            .filter_available(&aggregated, &checker, &registry)
            .await;

        assert_eq!(checked.total_results, 1);
        assert_eq!(checked.per_source.len(), 1);
        assert_eq!(checked.per_source[0].source, "alpha");
        assert_eq!(checked.per_source[0].results.len(), 1);
        assert_eq!(checked.per_source[0].results[0].id, "1");

        // Stats cover every source, with counts from the filtered set
        assert_eq!(checked.source_stats.len(), 2);
        assert_eq!(checked.source_stats[0].count, 1);
        assert_eq!(checked.source_stats[1].count, 0);
        assert_eq!(checked.source_stats[1].source_name, "Source beta");
    }
}
