//! Documentation endpoint handler.
//!
//! This module provides the `/doc` endpoint handler that displays
//! documentation for the aggregator service.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");
    state.record_http_request();

    let version = env!("CARGO_PKG_VERSION");
    let port = state
        .config
        .listen_port
        .unwrap_or(nanosuite_aggregator::config::DEFAULT_LISTEN_PORT);
    let doc = format!(
        r#"NANOSUITE AGGREGATOR - DOCUMENTATION
====================================

VERSION: {version}
DESCRIPTION: Polling aggregator for NovaStar LED screens managed by NanoSuite

HTTP ENDPOINTS
--------------
GET /statistics          - Aggregator facts; also refreshes the screen listing
GET /devices[?ids=a,b]   - Normalized device snapshot, optionally by device id
GET /ping                - Upstream reachability latency in milliseconds
GET /metrics             - Prometheus self-telemetry
GET /health              - Collector and cache status (plain text)
GET /doc                 - This documentation (plain text)

COLLECTION
----------
/statistics must be polled to discover screens. Each screen's sender and
receiver documents are refreshed every 30s while /devices is polled at
least once every 180s; otherwise collection pauses. /devices returns an
empty list until every listed screen has been fetched at least once.

AVAILABLE METRICS
-----------------
nanosuite_collector_cycles_total            - Completed fanout cycles
nanosuite_collector_cycle_duration_seconds  - Duration of the last cycle
nanosuite_collector_fetch_failures_total    - Failed per-screen fetches by profile
nanosuite_collector_paused                  - 1 while collection is paused
nanosuite_cache_screens                     - Screens held in the cache
nanosuite_devices_exported                  - Devices in the last snapshot
nanosuite_statistics_requests_total         - Facade calls by entry point

CONFIGURATION
-------------
Config file locations (in order):
1. CLI specified: -c /path/to/config.yaml
2. System config: /etc/nanosuite/aggregator.yaml
3. Current directory: ./nanosuite-aggregator.yaml

Key configuration options:
- host / port / protocol: Upstream NanoSuite API (default port 443, https)
- token: API token sent as isaac-token
- number_threads: Fanout pool size (default: 8, max 8)
- historical_properties: Receiver metrics routed to dynamicStatistics
- screen_name_filter: Only list screens matching this name
- ping_mode: ICMP or TCP

CLI COMMANDS
------------
nanosuite-aggregator                        - Start the service
nanosuite-aggregator check --ping           - Validate config and probe upstream
nanosuite-aggregator collect --format json  - One-shot collection
nanosuite-aggregator config -o config.yaml  - Generate config file
nanosuite-aggregator --help                 - Show all CLI options

EXAMPLE USAGE
-------------
curl http://localhost:{port}/statistics
curl http://localhost:{port}/devices?ids=17,18

{FOOTER_TEXT}
"#
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
