//! Upstream media fetching with identity spoofing and bounded retry.
//!
//! One `ProxyFetcher` serves every relay request. Each request walks a
//! small state machine: attempt the upstream fetch with forged identity
//! headers, retry transient failures under a fixed budget, then classify
//! the response as a playlist (rewritten as text) or opaque media bytes
//! (streamed through unmodified).

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;
use url::Url;

use super::playlist::rewrite_playlist;
use crate::config::{ProxyConfig, SpoofProfile};

/// Upstream body bytes, streamed without buffering the whole payload.
pub type MediaByteStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// Headers never copied from upstream to the relayed response.
///
/// Hop-by-hop headers plus framing headers that no longer hold once the
/// body is re-streamed (length, transfer and content encoding).
const STRIPPED_HEADERS: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
];

/// A successfully relayed upstream response.
pub enum FetchedMedia {
    /// HLS playlist, already rewritten to route through the relay.
    Playlist {
        status: StatusCode,
        content_type: String,
        text: String,
    },
    /// Any other media: headers filtered, body streamed unmodified.
    Passthrough {
        status: StatusCode,
        headers: HeaderMap,
        body: MediaByteStream,
    },
}

/// Media relay errors.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Upstream still unavailable after {attempts} attempts: {url}")]
    RetriesExhausted { attempts: u32, url: String },

    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Failed to read upstream playlist body: {reason}")]
    PlaylistBody { reason: String },

    #[error("Failed to construct upstream client: {reason}")]
    ClientBuild { reason: String },
}

/// Fetches upstream media with spoofed client identity and bounded retry.
pub struct ProxyFetcher {
    client: reqwest::Client,
    config: ProxyConfig,
}

impl ProxyFetcher {
    /// Creates a fetcher from relay configuration.
    ///
    /// Certificate validation is disabled for the outbound client: the
    /// targeted media hosts routinely present invalid or self-signed
    /// certificates.
    ///
    /// # Errors
    /// - `ProxyError::ClientBuild` - TLS backend initialization failed
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|error| ProxyError::ClientBuild {
                reason: error.to_string(),
            })?;

        Ok(Self { client, config })
    }

    /// Public origin used in rewritten playlist URIs.
    pub fn public_origin(&self) -> &str {
        &self.config.public_origin
    }

    /// Fetches `target` and returns it as rewritten playlist text or a
    /// pass-through byte stream.
    ///
    /// # Errors
    /// - `ProxyError::RetriesExhausted` - Upstream answered 503 on every attempt
    /// - `ProxyError::UpstreamStatus` - Upstream answered a non-transient failure status
    /// - `ProxyError::Network` - Transport failure on the final attempt
    /// - `ProxyError::PlaylistBody` - Playlist body could not be read as text
    pub async fn fetch(&self, target: &Url) -> Result<FetchedMedia, ProxyError> {
        let response = self.fetch_with_retry(target).await?;
        self.classify(response).await
    }

    /// Runs the attempt/evaluate loop: 503 and transport errors are
    /// transient and retried sequentially up to the budget, anything else
    /// fails the request immediately.
    async fn fetch_with_retry(&self, target: &Url) -> Result<reqwest::Response, ProxyError> {
        let headers = spoof_headers(&self.config.spoof, target);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self
                .client
                .get(target.clone())
                .headers(headers.clone())
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %target, attempt, "upstream fetch succeeded");
                    return Ok(response);
                }
                Ok(response) if response.status() == StatusCode::SERVICE_UNAVAILABLE => {
                    if attempt >= self.config.retry_budget {
                        return Err(ProxyError::RetriesExhausted {
                            attempts: attempt,
                            url: target.to_string(),
                        });
                    }
                    debug!(url = %target, attempt, "upstream 503, backing off");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Ok(response) => {
                    return Err(ProxyError::UpstreamStatus {
                        status: response.status().as_u16(),
                        url: target.to_string(),
                    });
                }
                Err(error) => {
                    if attempt >= self.config.retry_budget {
                        return Err(ProxyError::Network {
                            url: target.to_string(),
                            reason: error.to_string(),
                        });
                    }
                    debug!(url = %target, attempt, %error, "transport error, backing off");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
            }
        }
    }

    async fn classify(&self, response: reqwest::Response) -> Result<FetchedMedia, ProxyError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if is_playlist(&content_type, response.url()) {
            // Relative URIs resolve against the playlist's own fetch URL
            // (post-redirect), not the origin server root.
            let base = response.url().clone();
            let returned_type = if content_type.is_empty() {
                "application/vnd.apple.mpegurl".to_string()
            } else {
                content_type
            };
            let text = response
                .text()
                .await
                .map_err(|error| ProxyError::PlaylistBody {
                    reason: error.to_string(),
                })?;
            let rewritten = rewrite_playlist(&text, &base, &self.config.public_origin);

            Ok(FetchedMedia::Playlist {
                status,
                content_type: returned_type,
                text: rewritten,
            })
        } else {
            Ok(FetchedMedia::Passthrough {
                status,
                headers: passthrough_headers(response.headers()),
                body: response.bytes_stream().boxed(),
            })
        }
    }
}

/// Decides the playlist path from the content type, falling back to the
/// URL suffix for hosts that mislabel manifests.
fn is_playlist(content_type: &str, url: &Url) -> bool {
    content_type.to_ascii_lowercase().contains("mpegurl") || url.path().ends_with(".m3u8")
}

/// Builds the forged identity headers for one upstream request.
fn spoof_headers(profile: &SpoofProfile, target: &Url) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if !profile.enabled {
        return headers;
    }

    if let Ok(value) = HeaderValue::from_str(&profile.user_agent) {
        headers.insert(header::USER_AGENT, value);
    }

    if let Ok(value) = HeaderValue::from_str(&profile.forwarded_ip) {
        headers.insert(HeaderName::from_static("x-forwarded-for"), value.clone());
        headers.insert(HeaderName::from_static("client-ip"), value);
    }

    // A same-origin referrer defeats hot-link checks on the media host
    if profile.spoof_referer {
        let origin = target.origin().ascii_serialization();
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(header::REFERER, value);
        }
    }

    headers
}

fn passthrough_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if STRIPPED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}
