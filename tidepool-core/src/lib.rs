//! Tidepool Core - Configuration, source registry and media relay
//!
//! This crate provides the fundamental building blocks for aggregated video
//! discovery and playback: the catalog source registry, the streaming media
//! relay with playlist rewriting, and configuration management.

pub mod config;
pub mod proxy;
pub mod sources;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{ProxyConfig, SearchConfig, SpoofProfile, TidepoolConfig};
pub use proxy::{FetchedMedia, ProxyError, ProxyFetcher};
pub use sources::{SourceDescriptor, SourceRegistry, SourceRegistryError, default_sources};

/// Core errors that can bubble up from any Tidepool subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TidepoolError {
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Source registry error: {0}")]
    SourceRegistry(#[from] SourceRegistryError),

    #[error("Search error: {reason}")]
    Search { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {reason}")]
    Server { reason: String },
}

impl TidepoolError {
    /// Wraps an error from the web layer.
    pub fn from_server_error(error: impl std::fmt::Display) -> Self {
        TidepoolError::Server {
            reason: error.to_string(),
        }
    }

    /// Wraps an error from the search layer.
    pub fn from_search_error(error: impl std::fmt::Display) -> Self {
        TidepoolError::Search {
            reason: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TidepoolError>;
