//! Integration tests for Tidepool
//!
//! These tests verify the integration between different components of the
//! system: the relay endpoint against live stub upstreams, and the search
//! API against scripted catalog providers and probers.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/proxy_relay.rs"]
mod proxy_relay;

#[path = "integration/search_api.rs"]
mod search_api;
