//! HTTP request handlers organized by functionality

pub mod proxy;
pub mod search;

// Re-export handler functions
pub use proxy::{proxy_media, proxy_preflight};
pub use search::{SearchRequest, search_batch, search_batch_query, search_stream};
