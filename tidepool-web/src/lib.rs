//! Tidepool Web - JSON API Server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Pure JSON/SSE API server for aggregated catalog search and media relay.
//! Provides endpoints for frontend applications and external clients.

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{AppState, build_router, run_server};
