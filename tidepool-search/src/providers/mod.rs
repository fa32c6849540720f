//! Provider implementations for catalog search functionality.
//!
//! Different catalog backends return differently shaped payloads; each
//! provider normalizes one backend family into the single `CandidateVideo`
//! shape so the aggregator never branches on payload shape.

use async_trait::async_trait;
use tidepool_core::sources::SourceDescriptor;

use crate::errors::CatalogSearchError;
use crate::types::CandidateVideo;

pub mod development;
pub mod maccms;
pub mod mock;

pub use development::DevelopmentProvider;
pub use maccms::MacCmsProvider;
#[cfg(test)]
pub use mock::MockProvider;

/// Trait for catalog search providers.
///
/// Implementations query one source descriptor and normalize its response
/// (development data, real catalog APIs, mock providers for testing).
#[async_trait]
pub trait CatalogProvider: Send + Sync + std::fmt::Debug {
    /// Queries one catalog backend for one page of results.
    ///
    /// # Errors
    /// - `CatalogSearchError::SearchFailed` - Backend answered with a failure status
    /// - `CatalogSearchError::NetworkError` - Network connectivity issues
    /// - `CatalogSearchError::ParseError` - Response payload was not the expected shape
    async fn search(
        &self,
        source: &SourceDescriptor,
        query: &str,
        page: u32,
    ) -> Result<Vec<CandidateVideo>, CatalogSearchError>;
}
