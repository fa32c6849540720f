//! Centralized configuration for Tidepool.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Central configuration for all Tidepool components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct TidepoolConfig {
    pub network: NetworkConfig,
    pub search: SearchConfig,
    pub proxy: ProxyConfig,
}

/// Server binding and outbound HTTP configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address the API server binds to
    pub bind_address: SocketAddr,
    /// User agent for catalog API requests
    pub user_agent: &'static str,
    /// Timeout for a single catalog API request
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            user_agent: "tidepool/0.1.0",
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Search fan-out and availability checking configuration.
///
/// Controls per-source deadlines and the probe worker pool that keeps
/// availability checks from overwhelming slow or rate-limiting hosts.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Deadline for one source's catalog query within an aggregation run
    pub source_timeout: Duration,
    /// Maximum availability probes in flight at any instant
    pub availability_concurrency: usize,
    /// Deadline for a single availability probe
    pub probe_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(15),
            availability_concurrency: 8,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Media relay configuration.
///
/// Controls the retry loop for transient upstream failures and the origin
/// used when rewriting playlist URIs to point back at the proxy endpoint.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Public origin prefixed to rewritten playlist URIs (scheme + authority)
    pub public_origin: String,
    /// Maximum upstream attempts for one proxy request
    pub retry_budget: u32,
    /// Fixed delay between upstream attempts
    pub retry_backoff: Duration,
    /// Connect timeout for upstream media hosts
    pub connect_timeout: Duration,
    /// Client identity presented to upstream media hosts
    pub spoof: SpoofProfile,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            public_origin: "http://127.0.0.1:3000".to_string(),
            retry_budget: 5,
            retry_backoff: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(10),
            spoof: SpoofProfile::default(),
        }
    }
}

/// Client identity sent with upstream media requests.
///
/// Upstream hosts gate playback on referrer and client geography. The
/// profile forges a browser user agent, an origin-country client IP and a
/// same-origin referrer so those checks pass. Disabling the profile sends
/// requests with no identity headers at all.
#[derive(Debug, Clone)]
pub struct SpoofProfile {
    /// Whether identity headers are sent at all
    pub enabled: bool,
    /// Desktop browser user agent
    pub user_agent: String,
    /// Forged client IP for `X-Forwarded-For` / `Client-IP`
    pub forwarded_ip: String,
    /// Send a `Referer` matching the target URL's own origin
    pub spoof_referer: bool,
}

impl Default for SpoofProfile {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            // Beijing exit IP, makes requests appear to originate from China
            forwarded_ip: "202.108.22.5".to_string(),
            spoof_referer: true,
        }
    }
}

impl TidepoolConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TIDEPOOL_BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.network.bind_address = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("TIDEPOOL_SOURCE_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.search.source_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(concurrency) = std::env::var("TIDEPOOL_AVAILABILITY_CONCURRENCY") {
            if let Ok(count) = concurrency.parse::<usize>() {
                if count > 0 {
                    config.search.availability_concurrency = count;
                }
            }
        }

        if let Ok(origin) = std::env::var("TIDEPOOL_PUBLIC_ORIGIN") {
            config.proxy.public_origin = origin.trim_end_matches('/').to_string();
        }

        if let Ok(budget) = std::env::var("TIDEPOOL_PROXY_RETRY_BUDGET") {
            if let Ok(attempts) = budget.parse::<u32>() {
                if attempts > 0 {
                    config.proxy.retry_budget = attempts;
                }
            }
        }

        if let Ok(backoff) = std::env::var("TIDEPOOL_PROXY_BACKOFF_MS") {
            if let Ok(millis) = backoff.parse::<u64>() {
                config.proxy.retry_backoff = Duration::from_millis(millis);
            }
        }

        if let Ok(enabled) = std::env::var("TIDEPOOL_SPOOF_ENABLED") {
            config.proxy.spoof.enabled = enabled.parse().unwrap_or(true);
        }

        if let Ok(ip) = std::env::var("TIDEPOOL_SPOOF_IP") {
            config.proxy.spoof.forwarded_ip = ip;
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Short deadlines and backoffs so failure paths resolve quickly.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.search.source_timeout = Duration::from_secs(2);
        config.search.probe_timeout = Duration::from_millis(500);
        config.proxy.retry_backoff = Duration::from_millis(10);
        config.proxy.connect_timeout = Duration::from_secs(2);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = TidepoolConfig::default();

        assert_eq!(config.network.user_agent, "tidepool/0.1.0");
        assert_eq!(config.search.availability_concurrency, 8);
        assert_eq!(config.search.source_timeout, Duration::from_secs(15));
        assert_eq!(config.proxy.retry_budget, 5);
        assert_eq!(config.proxy.retry_backoff, Duration::from_millis(100));
        assert!(config.proxy.spoof.enabled);
        assert!(config.proxy.spoof.spoof_referer);
        assert_eq!(config.proxy.spoof.forwarded_ip, "202.108.22.5");
    }

    #[test]
    fn test_testing_preset_shortens_deadlines() {
        let config = TidepoolConfig::for_testing();
        assert!(config.search.source_timeout < TidepoolConfig::default().search.source_timeout);
        assert_eq!(config.proxy.retry_backoff, Duration::from_millis(10));
        // Retry budget is part of the contract under test, not a deadline
        assert_eq!(config.proxy.retry_budget, 5);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("TIDEPOOL_SOURCE_TIMEOUT", "30");
            std::env::set_var("TIDEPOOL_AVAILABILITY_CONCURRENCY", "4");
            std::env::set_var("TIDEPOOL_PUBLIC_ORIGIN", "https://relay.example.com/");
            std::env::set_var("TIDEPOOL_PROXY_RETRY_BUDGET", "3");
            std::env::set_var("TIDEPOOL_SPOOF_ENABLED", "false");
        }

        let config = TidepoolConfig::from_env();

        assert_eq!(config.search.source_timeout, Duration::from_secs(30));
        assert_eq!(config.search.availability_concurrency, 4);
        assert_eq!(config.proxy.public_origin, "https://relay.example.com");
        assert_eq!(config.proxy.retry_budget, 3);
        assert!(!config.proxy.spoof.enabled);

        // Zero would disable the probe pool entirely; it is ignored
        unsafe {
            std::env::set_var("TIDEPOOL_AVAILABILITY_CONCURRENCY", "0");
        }
        let config = TidepoolConfig::from_env();
        assert_eq!(config.search.availability_concurrency, 8);

        // Cleanup
        unsafe {
            std::env::remove_var("TIDEPOOL_SOURCE_TIMEOUT");
            std::env::remove_var("TIDEPOOL_AVAILABILITY_CONCURRENCY");
            std::env::remove_var("TIDEPOOL_PUBLIC_ORIGIN");
            std::env::remove_var("TIDEPOOL_PROXY_RETRY_BUDGET");
            std::env::remove_var("TIDEPOOL_SPOOF_ENABLED");
        }
    }
}
