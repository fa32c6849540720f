//! Development provider implementation for demo mode and integration tests.

use async_trait::async_trait;
use tidepool_core::sources::SourceDescriptor;

use super::CatalogProvider;
use crate::errors::CatalogSearchError;
use crate::types::{CandidateVideo, PlayUrl};

/// Development provider returning canned catalog data.
///
/// Lets the complete search and playback workflow run without external
/// API calls: every source answers with a couple of titles derived from
/// the query, each carrying playable-looking m3u8 episode URLs.
#[derive(Debug)]
pub struct DevelopmentProvider;

impl DevelopmentProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DevelopmentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogProvider for DevelopmentProvider {
    async fn search(
        &self,
        source: &SourceDescriptor,
        query: &str,
        page: u32,
    ) -> Result<Vec<CandidateVideo>, CatalogSearchError> {
        let slug = query.replace(' ', "-").to_lowercase();

        Ok(vec![
            CandidateVideo {
                id: format!("{}-{}-1", source.id, page),
                title: format!("{query} (HD)"),
                poster_url: Some(format!(
                    "https://posters.dev.invalid/{slug}.jpg"
                )),
                remarks: Some("更新至12集".to_string()),
                category_name: Some("剧情".to_string()),
                source_id: source.id.clone(),
                play_urls: PlayUrl::parse_field(&format!(
                    "第1集$https://media.dev.invalid/{slug}/e1/index.m3u8#第2集$https://media.dev.invalid/{slug}/e2/index.m3u8"
                )),
            },
            CandidateVideo {
                id: format!("{}-{}-2", source.id, page),
                title: format!("{query} 电影版"),
                poster_url: None,
                remarks: Some("HD中字".to_string()),
                category_name: Some("电影".to_string()),
                source_id: source.id.clone(),
                play_urls: PlayUrl::parse_field(&format!(
                    "正片$https://media.dev.invalid/{slug}/movie/index.m3u8"
                )),
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor {
            id: "dev".to_string(),
            name: "Development".to_string(),
            base_url: "https://dev.invalid/api.php/provide/vod".to_string(),
            enabled: true,
            priority: 1,
        }
    }

    #[tokio::test]
    async fn test_development_provider_returns_playable_candidates() {
        let provider = DevelopmentProvider::new();
        let results = provider.search(&descriptor(), "Deep Tide", 1).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source_id, "dev");
        assert!(results[0].primary_play_url().unwrap().ends_with("index.m3u8"));
        assert_eq!(results[0].play_urls.len(), 2);
    }

    #[tokio::test]
    async fn test_development_provider_ids_vary_by_page() {
        let provider = DevelopmentProvider::new();
        let first = provider.search(&descriptor(), "tide", 1).await.unwrap();
        let second = provider.search(&descriptor(), "tide", 2).await.unwrap();
        assert_ne!(first[0].id, second[0].id);
    }
}
