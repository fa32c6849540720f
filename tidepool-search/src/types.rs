//! Data types for aggregated catalog search.

use serde::{Deserialize, Serialize};

use crate::errors::CatalogSearchError;

/// Validated search input: trimmed text, 1-based page, deduplicated source ids.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    text: String,
    page: u32,
    source_ids: Vec<String>,
}

impl SearchQuery {
    /// Validates and normalizes raw search input.
    ///
    /// Duplicate source ids collapse to the first occurrence with request
    /// order otherwise preserved. Unknown ids are not checked here; they
    /// drop out later when resolved against a registry snapshot.
    ///
    /// # Errors
    /// - `CatalogSearchError::InvalidQuery` - Empty text, page 0 or empty source list
    pub fn new(
        text: &str,
        source_ids: Vec<String>,
        page: u32,
    ) -> Result<Self, CatalogSearchError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CatalogSearchError::InvalidQuery {
                reason: "query text is empty".to_string(),
            });
        }
        if page == 0 {
            return Err(CatalogSearchError::InvalidQuery {
                reason: "page must be at least 1".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        let deduped: Vec<String> = source_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if deduped.is_empty() {
            return Err(CatalogSearchError::InvalidQuery {
                reason: "at least one source must be specified".to_string(),
            });
        }

        Ok(Self {
            text: trimmed.to_string(),
            page,
            source_ids: deduped,
        })
    }

    /// Normalized query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Requested result page, 1-based.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Deduplicated source ids in request order.
    pub fn source_ids(&self) -> &[String] {
        &self.source_ids
    }
}

/// One playable episode URL with its display label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayUrl {
    pub label: String,
    pub url: String,
}

impl PlayUrl {
    /// Parses a MacCMS `vod_play_url` field into ordered episodes.
    ///
    /// The field packs episodes as `label$url` pairs separated by `#`,
    /// with alternative play groups separated by `$$$`. Only the first
    /// group is used; entries without an http(s) URL are skipped, and
    /// missing labels fall back to the episode's position.
    pub fn parse_field(raw: &str) -> Vec<PlayUrl> {
        let Some(group) = raw.split("$$$").next() else {
            return Vec::new();
        };

        let mut episodes: Vec<PlayUrl> = group
            .split('#')
            .filter_map(|entry| {
                let entry = entry.trim();
                if entry.is_empty() {
                    return None;
                }
                let (label, url) = match entry.split_once('$') {
                    Some((label, url)) => (label.trim().to_string(), url.trim()),
                    None => (String::new(), entry),
                };
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return None;
                }
                Some(PlayUrl {
                    label,
                    url: url.to_string(),
                })
            })
            .collect();

        for (index, episode) in episodes.iter_mut().enumerate() {
            if episode.label.is_empty() {
                episode.label = (index + 1).to_string();
            }
        }

        episodes
    }
}

/// One unverified search result from a single catalog backend.
///
/// Immutable once produced; identity within a run is (source_id, id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateVideo {
    pub id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub remarks: Option<String>,
    pub category_name: Option<String>,
    pub source_id: String,
    pub play_urls: Vec<PlayUrl>,
}

impl CandidateVideo {
    /// URL probed for availability and handed to the player first.
    pub fn primary_play_url(&self) -> Option<&str> {
        self.play_urls.first().map(|episode| episode.url.as_str())
    }
}

/// Result of one source's query within an aggregation run.
///
/// An error here is local to the source and never fatal to the run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSearchOutcome {
    pub source_id: String,
    pub candidates: Vec<CandidateVideo>,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

/// Combined result of one batch aggregation run.
///
/// Holds exactly one outcome per resolved source, success or failure, so
/// callers can tell "zero results" apart from "all sources failed".
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedSearch {
    pub query: String,
    pub page: u32,
    pub outcomes: Vec<SourceSearchOutcome>,
}

impl AggregatedSearch {
    /// Number of sources that finished, successfully or not.
    pub fn completed_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Total candidates across all outcomes before availability filtering.
    pub fn total_candidates(&self) -> usize {
        self.outcomes.iter().map(|o| o.candidates.len()).sum()
    }

    /// Outcome for one source id, if that source was part of the run.
    pub fn outcome_for(&self, source_id: &str) -> Option<&SourceSearchOutcome> {
        self.outcomes.iter().find(|o| o.source_id == source_id)
    }

    /// Union of all candidates, preserving per-source upstream order.
    pub fn all_candidates(&self) -> Vec<CandidateVideo> {
        self.outcomes
            .iter()
            .flat_map(|o| o.candidates.iter().cloned())
            .collect()
    }
}

/// Events emitted by a streaming aggregation run, in order of occurrence.
///
/// Serialized with a lowercase `type` tag for the SSE transport. A run
/// emits `start`, then interleaved `videos`/`progress`, then exactly one
/// `complete`; `error` only appears when the input itself was invalid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    Start {
        total_sources: usize,
    },
    Videos {
        videos: Vec<CandidateVideo>,
        source: String,
        completed_sources: usize,
        total_sources: usize,
    },
    Progress {
        completed_sources: usize,
        total_sources: usize,
        total_videos_found: usize,
    },
    Complete {
        total_videos_found: usize,
        total_sources: usize,
    },
    Error {
        message: String,
    },
}

/// One source's confirmed-playable results after availability filtering.
#[derive(Debug, Clone, Serialize)]
pub struct SourceResults {
    pub source: String,
    pub results: Vec<CandidateVideo>,
    pub response_time_ms: Option<u64>,
}

/// Display statistics for one source, recomputed from the filtered set.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStat {
    pub source_id: String,
    pub source_name: String,
    pub count: usize,
}

/// Batch aggregation output after dead links are filtered out.
#[derive(Debug, Clone, Serialize)]
pub struct CheckedSearch {
    pub per_source: Vec<SourceResults>,
    pub total_results: usize,
    pub source_stats: Vec<SourceStat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_trims_and_validates_text() {
        let query = SearchQuery::new("  deep sea  ", vec!["alpha".to_string()], 1).unwrap();
        assert_eq!(query.text(), "deep sea");

        let empty = SearchQuery::new("   ", vec!["alpha".to_string()], 1);
        assert!(matches!(
            empty,
            Err(CatalogSearchError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_query_rejects_page_zero() {
        let result = SearchQuery::new("query", vec!["alpha".to_string()], 0);
        assert!(matches!(
            result,
            Err(CatalogSearchError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_query_dedups_sources_preserving_order() {
        let query = SearchQuery::new(
            "query",
            vec![
                "beta".to_string(),
                "alpha".to_string(),
                "beta".to_string(),
                "alpha".to_string(),
            ],
            1,
        )
        .unwrap();
        assert_eq!(query.source_ids(), ["beta", "alpha"]);
    }

    #[test]
    fn test_query_rejects_empty_source_list() {
        let result = SearchQuery::new("query", Vec::new(), 1);
        assert!(matches!(
            result,
            Err(CatalogSearchError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_parse_field_labeled_episodes() {
        let episodes = PlayUrl::parse_field(
            "第1集$https://cdn.example.com/e1/index.m3u8#第2集$https://cdn.example.com/e2/index.m3u8",
        );
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].label, "第1集");
        assert_eq!(episodes[0].url, "https://cdn.example.com/e1/index.m3u8");
        assert_eq!(episodes[1].label, "第2集");
    }

    #[test]
    fn test_parse_field_uses_first_play_group_only() {
        let episodes = PlayUrl::parse_field(
            "1$https://a.example.com/1.m3u8$$$1$https://b.example.com/1.mp4",
        );
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].url, "https://a.example.com/1.m3u8");
    }

    #[test]
    fn test_parse_field_skips_non_http_entries_and_numbers_bare_urls() {
        let episodes =
            PlayUrl::parse_field("ftp://old.example.com/1.ts#https://cdn.example.com/1.m3u8");
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].label, "1");
        assert_eq!(episodes[0].url, "https://cdn.example.com/1.m3u8");
    }

    #[test]
    fn test_parse_field_empty_input() {
        assert!(PlayUrl::parse_field("").is_empty());
    }

    #[test]
    fn test_search_event_serializes_with_type_tag() {
        let event = SearchEvent::Complete {
            total_videos_found: 7,
            total_sources: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["total_videos_found"], 7);
        assert_eq!(json["total_sources"], 3);

        let start = serde_json::to_value(SearchEvent::Start { total_sources: 3 }).unwrap();
        assert_eq!(start["type"], "start");
    }

    #[test]
    fn test_aggregated_search_counts() {
        fn candidate(id: &str, source: &str) -> CandidateVideo {
            CandidateVideo {
                id: id.to_string(),
                title: format!("Video {id}"),
                poster_url: None,
                remarks: None,
                category_name: None,
                source_id: source.to_string(),
                play_urls: Vec::new(),
            }
        }

        let aggregated = AggregatedSearch {
            query: "query".to_string(),
            page: 1,
            outcomes: vec![
                SourceSearchOutcome {
                    source_id: "alpha".to_string(),
                    candidates: vec![candidate("1", "alpha"), candidate("2", "alpha")],
                    response_time_ms: 120,
                    error: None,
                },
                SourceSearchOutcome {
                    source_id: "beta".to_string(),
                    candidates: Vec::new(),
                    response_time_ms: 80,
                    error: Some("connection refused".to_string()),
                },
            ],
        };

        assert_eq!(aggregated.completed_count(), 2);
        assert_eq!(aggregated.total_candidates(), 2);
        assert_eq!(aggregated.all_candidates().len(), 2);
        assert!(aggregated.outcome_for("beta").unwrap().error.is_some());
        assert!(aggregated.outcome_for("gamma").is_none());
    }
}
