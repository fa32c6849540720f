//! Tidepool Search - Parallel catalog discovery and link verification
//!
//! Fans a query out across many third-party catalog backends concurrently,
//! normalizes their differently shaped payloads into one candidate form,
//! and verifies stream reachability under bounded concurrency before a
//! result is ever shown to a user.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]

pub mod aggregator;
pub mod availability;
pub mod errors;
pub mod providers;
pub mod types;

// Re-export main types
pub use aggregator::SearchAggregator;
pub use availability::{AvailabilityChecker, HttpProber, LinkProber, StaticProber};
pub use errors::CatalogSearchError;
pub use providers::{CatalogProvider, DevelopmentProvider, MacCmsProvider};
pub use types::{
    AggregatedSearch, CandidateVideo, CheckedSearch, PlayUrl, SearchEvent, SearchQuery,
    SourceResults, SourceSearchOutcome, SourceStat,
};

/// Convenience type alias for Results with CatalogSearchError.
pub type Result<T> = std::result::Result<T, CatalogSearchError>;
