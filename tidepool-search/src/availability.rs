//! Candidate availability checking.
//!
//! Catalog backends happily return entries whose streams died long ago.
//! Before results reach a user, every candidate's primary play URL is
//! probed under a bounded worker pool; only confirmed-reachable entries
//! survive. Probe failures are "not available", never errors, and are
//! never retried here (retry belongs to the relay layer).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use tracing::debug;

use crate::types::CandidateVideo;

/// Trait for link reachability probes.
///
/// Production probing is an HTTP request; tests substitute fixed verdicts
/// so the retained set is deterministic.
#[async_trait]
pub trait LinkProber: Send + Sync + std::fmt::Debug {
    /// Returns whether the URL answered a lightweight fetch in time.
    async fn probe(&self, url: &str) -> bool;
}

/// HTTP prober issuing a small ranged GET against the stream URL.
///
/// A ranged GET is used instead of HEAD: several of the targeted CDNs
/// reject HEAD outright. Any 2xx (200 or 206) counts as reachable.
#[derive(Debug)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    /// Creates a prober with the given per-probe deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl LinkProber for HttpProber {
    async fn probe(&self, url: &str) -> bool {
        let result = self
            .client
            .get(url)
            .header(header::RANGE, "bytes=0-1023")
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(url, %error, "availability probe failed");
                false
            }
        }
    }
}

/// Prober answering from a fixed allowlist of reachable URLs.
///
/// Gives tests and offline development fully deterministic probe
/// outcomes.
#[derive(Debug, Default)]
pub struct StaticProber {
    reachable: std::collections::HashSet<String>,
}

impl StaticProber {
    /// Creates a prober that confirms exactly the given URLs.
    pub fn new(reachable: &[&str]) -> Self {
        Self {
            reachable: reachable.iter().map(|url| (*url).to_string()).collect(),
        }
    }
}

#[async_trait]
impl LinkProber for StaticProber {
    async fn probe(&self, url: &str) -> bool {
        self.reachable.contains(url)
    }
}

/// Filters candidate sets down to confirmed-playable entries.
///
/// The worker pool is a counting semaphore: at most `concurrency` probes
/// are in flight at any instant, deliberate backpressure against fanning
/// hundreds of checks out to slow or rate-limiting hosts.
#[derive(Debug)]
pub struct AvailabilityChecker {
    prober: Arc<dyn LinkProber>,
    concurrency: usize,
}

impl AvailabilityChecker {
    /// Creates a checker over the given prober and pool size.
    pub fn new(prober: Arc<dyn LinkProber>, concurrency: usize) -> Self {
        Self {
            prober,
            concurrency: concurrency.max(1),
        }
    }

    /// Returns the subset of candidates whose primary play URL answered.
    ///
    /// Candidates without any play URL are dropped without a probe. The
    /// returned order follows the input; for fixed probe outcomes the
    /// retained set is deterministic.
    pub async fn check_many(&self, candidates: Vec<CandidateVideo>) -> Vec<CandidateVideo> {
        let total = candidates.len();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.concurrency));

        let mut handles = Vec::with_capacity(total);
        for candidate in candidates {
            let prober = Arc::clone(&self.prober);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let url = candidate.primary_play_url()?.to_string();
                // Permit is held for the probe only and released on every
                // path, including probe failure
                let _permit = semaphore.acquire_owned().await.ok()?;
                if prober.probe(&url).await {
                    Some(candidate)
                } else {
                    None
                }
            }));
        }

        let mut retained = Vec::new();
        for handle in handles {
            if let Ok(Some(candidate)) = handle.await {
                retained.push(candidate);
            }
        }

        debug!(total, retained = retained.len(), "availability check complete");
        retained
    }
}
