//! Mock provider for testing.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tidepool_core::sources::SourceDescriptor;

use super::CatalogProvider;
use crate::errors::CatalogSearchError;
use crate::types::{CandidateVideo, PlayUrl};

/// Scripted provider: each source id answers with fixed videos, a fixed
/// failure, or nothing, optionally after a fixed delay. Lets tests pin
/// per-source outcomes and latencies deterministically.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    scripts: HashMap<String, SourceScript>,
}

#[derive(Debug, Clone)]
struct SourceScript {
    delay: Duration,
    outcome: Result<Vec<CandidateVideo>, String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a source to answer with the given videos.
    pub fn with_videos(mut self, source_id: &str, videos: Vec<CandidateVideo>) -> Self {
        self.scripts.insert(
            source_id.to_string(),
            SourceScript {
                delay: Duration::ZERO,
                outcome: Ok(videos),
            },
        );
        self
    }

    /// Scripts a source to fail with the given reason.
    pub fn with_failure(mut self, source_id: &str, reason: &str) -> Self {
        self.scripts.insert(
            source_id.to_string(),
            SourceScript {
                delay: Duration::ZERO,
                outcome: Err(reason.to_string()),
            },
        );
        self
    }

    /// Delays a previously scripted source's answer.
    pub fn with_delay(mut self, source_id: &str, delay: Duration) -> Self {
        if let Some(script) = self.scripts.get_mut(source_id) {
            script.delay = delay;
        }
        self
    }

    /// Builds a minimal candidate for test scripting.
    pub fn video(source_id: &str, id: &str, title: &str, url: &str) -> CandidateVideo {
        CandidateVideo {
            id: id.to_string(),
            title: title.to_string(),
            poster_url: None,
            remarks: None,
            category_name: None,
            source_id: source_id.to_string(),
            play_urls: vec![PlayUrl {
                label: "1".to_string(),
                url: url.to_string(),
            }],
        }
    }
}

#[async_trait]
impl CatalogProvider for MockProvider {
    async fn search(
        &self,
        source: &SourceDescriptor,
        _query: &str,
        _page: u32,
    ) -> Result<Vec<CandidateVideo>, CatalogSearchError> {
        let Some(script) = self.scripts.get(&source.id) else {
            return Ok(Vec::new());
        };

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        match &script.outcome {
            Ok(videos) => Ok(videos.clone()),
            Err(reason) => Err(CatalogSearchError::ProviderError {
                reason: reason.clone(),
            }),
        }
    }
}
