//! Streaming media relay.
//!
//! Fetches a target media URL on a player's behalf, defeating referrer and
//! geography checks on the upstream host, and either streams the bytes
//! through unmodified or rewrites HLS playlist text so every segment and
//! encryption-key request routes back through the relay.

pub mod fetch;
pub mod playlist;

pub use fetch::{FetchedMedia, MediaByteStream, ProxyError, ProxyFetcher};
pub use playlist::{proxy_wrap, rewrite_playlist};
