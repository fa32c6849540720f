//! MacCMS catalog provider for production use.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use tidepool_core::config::NetworkConfig;
use tidepool_core::sources::SourceDescriptor;
use tracing::debug;

use super::CatalogProvider;
use crate::errors::CatalogSearchError;
use crate::types::{CandidateVideo, PlayUrl};

/// Catalog provider for MacCMS-style `api.php/provide/vod` backends.
///
/// This API family covers the overwhelming majority of third-party video
/// catalogs: a JSON endpoint taking `ac=videolist&wd=<query>&pg=<page>`
/// and answering with a `list` of `vod_*` records. Field types are loose
/// across deployments (ids arrive as numbers or strings, optional fields
/// as empty strings), so normalization tolerates both.
#[derive(Debug)]
pub struct MacCmsProvider {
    client: reqwest::Client,
    user_agent: String,
    request_timeout: Duration,
}

/// Response envelope from a MacCMS videolist query.
#[derive(Debug, Deserialize)]
struct VodListResponse {
    #[serde(default)]
    list: Vec<VodItem>,
}

/// Single record from a MacCMS videolist response.
#[derive(Debug, Deserialize)]
struct VodItem {
    #[serde(default)]
    vod_id: serde_json::Value,
    #[serde(default)]
    vod_name: String,
    #[serde(default)]
    vod_pic: Option<String>,
    #[serde(default)]
    vod_remarks: Option<String>,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    vod_play_url: Option<String>,
}

impl MacCmsProvider {
    /// Creates a provider with default network configuration.
    pub fn new() -> Self {
        Self::from_config(&NetworkConfig::default())
    }

    /// Creates a provider using outbound HTTP settings from configuration.
    pub fn from_config(network: &NetworkConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: network.user_agent.to_string(),
            request_timeout: network.request_timeout,
        }
    }

    fn normalize(item: VodItem, source_id: &str) -> Option<CandidateVideo> {
        let id = id_string(&item.vod_id)?;
        let title = item.vod_name.trim();
        if title.is_empty() {
            return None;
        }

        let play_urls = item
            .vod_play_url
            .as_deref()
            .map(PlayUrl::parse_field)
            .unwrap_or_default();

        Some(CandidateVideo {
            id,
            title: title.to_string(),
            poster_url: none_if_blank(item.vod_pic),
            remarks: none_if_blank(item.vod_remarks),
            category_name: none_if_blank(item.type_name),
            source_id: source_id.to_string(),
            play_urls,
        })
    }
}

impl Default for MacCmsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogProvider for MacCmsProvider {
    async fn search(
        &self,
        source: &SourceDescriptor,
        query: &str,
        page: u32,
    ) -> Result<Vec<CandidateVideo>, CatalogSearchError> {
        let page_param = page.to_string();
        let params = [("ac", "videolist"), ("wd", query), ("pg", &page_param)];

        let response = self
            .client
            .get(&source.base_url)
            .query(&params)
            .header(header::USER_AGENT, &self.user_agent)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| CatalogSearchError::NetworkError {
                reason: format!("{} request failed: {e}", source.id),
            })?;

        if !response.status().is_success() {
            return Err(CatalogSearchError::SearchFailed {
                query: query.to_string(),
                reason: format!("{} HTTP {}", source.id, response.status()),
            });
        }

        let payload: VodListResponse =
            response
                .json()
                .await
                .map_err(|e| CatalogSearchError::ParseError {
                    reason: format!("{} JSON parsing failed: {e}", source.id),
                })?;

        let candidates: Vec<CandidateVideo> = payload
            .list
            .into_iter()
            .filter_map(|item| Self::normalize(item, &source.id))
            .collect();

        debug!(
            source = %source.id,
            count = candidates.len(),
            "catalog query normalized"
        );

        Ok(candidates)
    }
}

/// Extracts a usable id from a loosely typed `vod_id` value.
fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
