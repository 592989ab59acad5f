//! Prometheus self-telemetry for the aggregator.
//!
//! This module defines the gauges and counters describing collector
//! activity and facade traffic. They are exported on `/metrics`.

use prometheus::{Gauge, IntCounter, IntCounterVec, Opts, Registry};

/// Collection of Prometheus metrics for collector and facade monitoring.
#[derive(Clone)]
pub struct AggregatorMetrics {
    pub cycles_total: IntCounter,
    pub cycle_duration: Gauge,
    pub fetch_failures: IntCounterVec,
    pub paused: Gauge,
    pub cache_screens: Gauge,
    pub devices_exported: Gauge,
    pub statistics_requests: IntCounterVec,
}

impl AggregatorMetrics {
    /// Creates and registers all metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let cycles_total = IntCounter::new(
            "nanosuite_collector_cycles_total",
            "Number of completed fanout cycles",
        )?;
        let cycle_duration = Gauge::new(
            "nanosuite_collector_cycle_duration_seconds",
            "Time spent in the last fanout cycle",
        )?;
        let fetch_failures = IntCounterVec::new(
            Opts::new(
                "nanosuite_collector_fetch_failures_total",
                "Per-screen asset fetches that failed or returned an error payload",
            ),
            &["profile"],
        )?;
        let paused = Gauge::new(
            "nanosuite_collector_paused",
            "Whether collection is paused for lack of consumers (1) or active (0)",
        )?;
        let cache_screens = Gauge::new(
            "nanosuite_cache_screens",
            "Number of screens currently held in the asset cache",
        )?;
        let devices_exported = Gauge::new(
            "nanosuite_devices_exported",
            "Number of devices returned by the last device snapshot",
        )?;
        let statistics_requests = IntCounterVec::new(
            Opts::new(
                "nanosuite_statistics_requests_total",
                "Facade calls by entry point",
            ),
            &["entry_point"],
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(paused.clone()))?;
        registry.register(Box::new(cache_screens.clone()))?;
        registry.register(Box::new(devices_exported.clone()))?;
        registry.register(Box::new(statistics_requests.clone()))?;

        Ok(Self {
            cycles_total,
            cycle_duration,
            fetch_failures,
            paused,
            cache_screens,
            devices_exported,
            statistics_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn test_metrics_register_and_encode() {
        let registry = Registry::new();
        let metrics = AggregatorMetrics::new(&registry).unwrap();
        metrics.cycles_total.inc();
        metrics
            .fetch_failures
            .with_label_values(&["novastar_sender"])
            .inc();
        metrics.paused.set(1.0);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("nanosuite_collector_cycles_total 1"));
        assert!(text.contains("nanosuite_collector_fetch_failures_total{profile=\"novastar_sender\"} 1"));
        assert!(text.contains("nanosuite_collector_paused 1"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        AggregatorMetrics::new(&registry).unwrap();
        assert!(AggregatorMetrics::new(&registry).is_err());
    }
}
