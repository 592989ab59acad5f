//! `collect` subcommand: one synchronous collection pass.
//!
//! Refreshes aggregator facts and the screen listing, runs a single fanout
//! cycle inline and prints the normalized devices.

use anyhow::{Context, Result};
use nanosuite_aggregator::client::HttpFetcher;
use nanosuite_aggregator::metrics::AggregatorMetrics;
use nanosuite_aggregator::{AggregatedDevice, Aggregator, Config, PropertyMap, WorkerMode};
use prometheus::Registry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::cli::ConfigFormat;

#[derive(Debug, Serialize)]
struct CollectReport {
    statistics: PropertyMap,
    devices: Vec<DeviceSummary>,
}

/// Device as printed; properties only with `--verbose`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
    device_name: String,
    device_online: bool,
    property_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<PropertyMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dynamic_statistics: Option<PropertyMap>,
}

impl DeviceSummary {
    fn from_device(device: AggregatedDevice, verbose: bool) -> Self {
        Self {
            property_count: device.properties.len() + device.dynamic_statistics.len(),
            device_id: device.device_id,
            device_name: device.device_name,
            device_online: device.device_online,
            properties: verbose.then_some(device.properties),
            dynamic_statistics: verbose.then_some(device.dynamic_statistics),
        }
    }
}

/// Runs one collection pass against the configured upstream.
pub fn command_collect(verbose: bool, format: ConfigFormat, config: &Config) -> Result<()> {
    let start = Instant::now();
    let fetcher = HttpFetcher::from_config(config).context("Failed to build upstream client")?;
    let metrics = AggregatorMetrics::new(&Registry::new())?;
    let aggregator = Aggregator::with_clock(
        config.clone(),
        Arc::new(fetcher),
        metrics,
        Arc::new(nanosuite_aggregator::clock::SystemClock),
        WorkerMode::Manual,
    );

    let statistics = aggregator
        .get_statistics()
        .context("Failed to retrieve aggregator statistics")?;
    let cycle = aggregator.collector().run_cycle().unwrap_or_default();
    let devices = aggregator.retrieve_multiple_statistics(None);
    aggregator.destroy();

    eprintln!(
        "🧪 Collected {} screens ({} documents, {} failures) in {:.2}ms",
        cycle.screens,
        cycle.updated,
        cycle.failed,
        start.elapsed().as_secs_f64() * 1000.0
    );
    if devices.is_empty() && cycle.screens > 0 {
        eprintln!("⚠️  Some screens have no sender or receiver data yet");
    }

    let report = CollectReport {
        statistics,
        devices: devices
            .into_iter()
            .map(|d| DeviceSummary::from_device(d, verbose))
            .collect(),
    };
    println!("{}", render(&report, format)?);
    Ok(())
}

fn render(report: &CollectReport, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(report)?,
        ConfigFormat::Toml => toml::to_string_pretty(report)?,
        ConfigFormat::Yaml => serde_yaml::to_string(report)?,
    })
}
