//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! collector and cache status as plain text.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "nanosuite-aggregator: NovaStar screen statistics from NanoSuite";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.record_http_request();

    let collector = state.aggregator.collector();
    let cache = state.aggregator.cache();

    let status = if collector.is_running() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let message = if !collector.is_running() {
        "Collector stopped"
    } else if collector.is_paused() {
        "OK - Collection paused (no recent device requests)"
    } else {
        "OK"
    };

    let mut table = String::new();
    writeln!(table, "{:25} | {:>12}", "Item", "Value").ok();
    writeln!(table, "{}", "-".repeat(40)).ok();
    writeln!(table, "{:25} | {:>12}", "Uptime (s)", state.uptime_seconds()).ok();
    writeln!(table, "{:25} | {:>12}", "HTTP requests", state.http_requests()).ok();
    writeln!(table, "{:25} | {:>12}", "Cached screens", cache.len()).ok();
    writeln!(
        table,
        "{:25} | {:>12}",
        "Screens pending",
        if cache.has_incomplete() { "yes" } else { "no" }
    )
    .ok();
    writeln!(
        table,
        "{:25} | {:>12}",
        "Next cycle in (s)",
        collector.time_until_next_cycle().as_secs()
    )
    .ok();
    writeln!(
        table,
        "{:25} | {:>12}",
        "Fanout threads",
        collector.settings().pool_size
    )
    .ok();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\n{table}\n{FOOTER_TEXT}"),
    )
}
