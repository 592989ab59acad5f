//! Aggregator statistics endpoint handler.
//!
//! `/statistics` refreshes system information and the screen listing from
//! upstream and returns the three aggregator facts as JSON.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use nanosuite_aggregator::{AggregatorError, PropertyMap};
use tracing::{debug, error, instrument, warn};

use crate::state::SharedState;

/// Error type for facade failures surfaced over HTTP.
#[derive(Debug)]
pub enum StatisticsError {
    Login(String),
    Unreachable(String),
    Internal(String),
}

impl From<AggregatorError> for StatisticsError {
    fn from(err: AggregatorError) -> Self {
        let message = err.to_string();
        match err {
            AggregatorError::Login(_) => StatisticsError::Login(message),
            AggregatorError::ResourceNotReachable { .. } => StatisticsError::Unreachable(message),
            _ => StatisticsError::Internal(message),
        }
    }
}

impl IntoResponse for StatisticsError {
    fn into_response(self) -> axum::response::Response {
        match self {
            StatisticsError::Login(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            StatisticsError::Unreachable(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            StatisticsError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}

/// Handler for the /statistics endpoint.
#[instrument(skip(state))]
pub async fn statistics_handler(
    State(state): State<SharedState>,
) -> Result<Json<PropertyMap>, StatisticsError> {
    debug!("Processing /statistics request");
    state.record_http_request();

    let aggregator = state.aggregator.clone();
    let result = tokio::task::spawn_blocking(move || aggregator.get_statistics())
        .await
        .map_err(|e| {
            error!("Statistics task failed: {}", e);
            StatisticsError::Internal("Statistics task failed".into())
        })?;

    match result {
        Ok(stats) => Ok(Json(stats)),
        Err(e) => {
            warn!("Failed to retrieve aggregator statistics: {}", e);
            Err(e.into())
        }
    }
}
