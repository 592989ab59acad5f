//! Reachability probe endpoint handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Handler for the /ping endpoint.
#[instrument(skip(state))]
pub async fn ping_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /ping request");
    state.record_http_request();

    let aggregator = state.aggregator.clone();
    match tokio::task::spawn_blocking(move || aggregator.probe().ping()).await {
        Ok(Ok(latency_ms)) => (StatusCode::OK, Json(json!({ "latency_ms": latency_ms }))),
        Ok(Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e) => {
            error!("Ping task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Ping task failed" })),
            )
        }
    }
}
