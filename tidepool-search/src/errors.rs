//! Error types for catalog search functionality.

use thiserror::Error;

/// Errors that can occur during catalog search operations.
#[derive(Debug, Error)]
pub enum CatalogSearchError {
    /// Search input failed validation before any I/O was attempted.
    #[error("Invalid query: {reason}")]
    InvalidQuery {
        /// Why the input was rejected
        reason: String,
    },

    /// Search operation failed with the specified query and reason.
    #[error("Search failed for query '{query}': {reason}")]
    SearchFailed {
        /// The search query that failed
        query: String,
        /// The reason for the failure
        reason: String,
    },

    /// Network communication error occurred during search.
    #[error("Network error: {reason}")]
    NetworkError {
        /// The reason for the network error
        reason: String,
    },

    /// Failed to parse a catalog backend's response payload.
    #[error("Parse error: {reason}")]
    ParseError {
        /// The reason for the parse error
        reason: String,
    },

    /// Catalog backend returned an error or is unavailable.
    #[error("Provider error: {reason}")]
    ProviderError {
        /// The reason for the provider error
        reason: String,
    },
}
