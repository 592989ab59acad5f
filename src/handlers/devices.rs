//! Device snapshot endpoint handler.
//!
//! `/devices` returns the normalized device list. An optional `ids` query
//! parameter (comma-separated device ids) restricts the result.

use axum::{
    extract::{Query, State},
    Json,
};
use nanosuite_aggregator::AggregatedDevice;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::handlers::statistics::StatisticsError;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct DevicesQuery {
    pub ids: Option<String>,
}

impl DevicesQuery {
    fn device_ids(&self) -> Option<Vec<String>> {
        self.ids.as_deref().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

/// Handler for the /devices endpoint.
#[instrument(skip(state))]
pub async fn devices_handler(
    State(state): State<SharedState>,
    Query(query): Query<DevicesQuery>,
) -> Result<Json<Vec<AggregatedDevice>>, StatisticsError> {
    debug!("Processing /devices request");
    state.record_http_request();

    let ids = query.device_ids();
    let aggregator = state.aggregator.clone();
    let devices = tokio::task::spawn_blocking(move || {
        aggregator.retrieve_multiple_statistics(ids.as_deref())
    })
    .await
    .map_err(|e| {
        error!("Device snapshot task failed: {}", e);
        StatisticsError::Internal("Device snapshot task failed".into())
    })?;

    debug!("Returning {} devices", devices.len());
    Ok(Json(devices))
}
