//! HTTP endpoint handlers for the aggregator.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/statistics`: Aggregator facts (system name, hostname, timezone)
//! - `/devices`: Normalized per-screen device snapshot
//! - `/ping`: Upstream reachability probe
//! - `/metrics`: Prometheus self-telemetry
//! - `/health`: Health check endpoint
//! - `/doc`: Documentation endpoint

pub mod devices;
pub mod doc;
pub mod health;
pub mod metrics;
pub mod ping;
pub mod statistics;

// Re-export handlers
pub use devices::devices_handler;
pub use doc::doc_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use ping::ping_handler;
pub use statistics::statistics_handler;
