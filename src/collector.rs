//! Background collection of per-screen sender and receiver documents.
//!
//! The collector is a small state machine driven by [`Collector::step`]:
//!
//! - paused while no consumer has asked for device statistics within the
//!   retrieve timeout (180 s by default);
//! - otherwise, once `next_cycle_at` has passed, one fanout cycle fetches
//!   every non-screen profile for every cached screen on a bounded rayon
//!   pool, then `next_cycle_at` moves one interval ahead.
//!
//! [`CollectorWorker`] runs `step` on a dedicated OS thread with short
//! sleeps in between. Tests and the one-shot CLI drive `step` or
//! [`Collector::run_cycle`] directly.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::AssetCache;
use crate::catalog::ProfileType;
use crate::client::{asset_query, describe, is_error_payload, AssetFetcher, ASSETS_PATH};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::FetchError;
use crate::metrics::AggregatorMetrics;

/// Poll granularity of the worker loop.
const LOOP_SLEEP: Duration = Duration::from_micros(500);
/// Maximum single sleep while waiting for the next cycle.
const WAIT_SLEEP: Duration = Duration::from_secs(1);

/// Collector tuning, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub pool_size: usize,
    pub cycle_interval: Duration,
    pub retrieve_timeout: Duration,
}

impl CollectorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pool_size: config.number_threads(),
            cycle_interval: config.cycle_interval(),
            retrieve_timeout: config.retrieve_timeout(),
        }
    }
}

/// Result of one [`Collector::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No consumer within the retrieve timeout; nothing fetched.
    Paused,
    /// A fanout cycle ran.
    Cycled(CycleReport),
    /// Waiting for the next cycle, or another cycle is already running.
    Waiting,
}

/// Summary of one fanout cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub screens: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct Collector {
    cache: Arc<AssetCache>,
    fetcher: Arc<dyn AssetFetcher>,
    clock: Arc<dyn Clock>,
    metrics: AggregatorMetrics,
    settings: CollectorSettings,

    in_progress: AtomicBool,
    paused: AtomicBool,
    valid_retrieve_until_ms: AtomicI64,
    next_cycle_at_ms: AtomicI64,
    cycle_in_flight: AtomicBool,
}

impl Collector {
    pub fn new(
        cache: Arc<AssetCache>,
        fetcher: Arc<dyn AssetFetcher>,
        clock: Arc<dyn Clock>,
        metrics: AggregatorMetrics,
        settings: CollectorSettings,
    ) -> Self {
        metrics.paused.set(1.0);
        Self {
            cache,
            fetcher,
            clock,
            metrics,
            settings,
            in_progress: AtomicBool::new(true),
            paused: AtomicBool::new(true),
            valid_retrieve_until_ms: AtomicI64::new(0),
            next_cycle_at_ms: AtomicI64::new(0),
            cycle_in_flight: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// Records consumer activity, extending the liveness window.
    pub fn touch(&self) {
        let until = self.clock.now_ms() + self.settings.retrieve_timeout.as_millis() as i64;
        self.valid_retrieve_until_ms.store(until, Ordering::Release);
        self.update_paused();
    }

    /// Recomputes the paused flag from the liveness window.
    pub fn update_paused(&self) -> bool {
        let paused =
            self.valid_retrieve_until_ms.load(Ordering::Acquire) < self.clock.now_ms();
        let was_paused = self.paused.swap(paused, Ordering::AcqRel);
        if paused != was_paused {
            if paused {
                info!("No device statistics requests for a while, pausing collection");
            } else {
                info!("Device statistics requested, resuming collection");
            }
        }
        self.metrics.paused.set(if paused { 1.0 } else { 0.0 });
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Milliseconds until the next cycle may start (zero when due).
    pub fn time_until_next_cycle(&self) -> Duration {
        let remaining = self.next_cycle_at_ms.load(Ordering::Acquire) - self.clock.now_ms();
        Duration::from_millis(remaining.max(0) as u64)
    }

    /// One iteration of the collection state machine.
    pub fn step(&self) -> StepOutcome {
        if self.update_paused() {
            return StepOutcome::Paused;
        }
        if self.clock.now_ms() < self.next_cycle_at_ms.load(Ordering::Acquire) {
            return StepOutcome::Waiting;
        }
        match self.run_cycle() {
            Some(report) => StepOutcome::Cycled(report),
            None => StepOutcome::Waiting,
        }
    }

    /// Runs one fanout cycle now, regardless of cadence and pause state.
    ///
    /// Returns `None` when another cycle is already in flight. On completion
    /// the next cycle is scheduled one interval ahead.
    #[instrument(skip(self))]
    pub fn run_cycle(&self) -> Option<CycleReport> {
        if self
            .cycle_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Fanout cycle already in flight");
            return None;
        }

        let start = Instant::now();
        let report = self.fanout();

        let next = self.clock.now_ms() + self.settings.cycle_interval.as_millis() as i64;
        self.next_cycle_at_ms.store(next, Ordering::Release);
        self.cycle_in_flight.store(false, Ordering::Release);

        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.cycles_total.inc();
        self.metrics.cycle_duration.set(elapsed);
        self.metrics.cache_screens.set(self.cache.len() as f64);

        info!(
            "Finished collecting devices statistics cycle: {} screens, {} documents updated, {} failures, {:.2}ms",
            report.screens,
            report.updated,
            report.failed,
            elapsed * 1000.0
        );
        Some(report)
    }

    fn fanout(&self) -> CycleReport {
        use rayon::prelude::*;

        let screens = self.cache.snapshot_keys();
        if screens.is_empty() {
            debug!("No screens cached yet, nothing to fan out");
            return CycleReport::default();
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.pool_size)
            .thread_name(|i| format!("nanosuite-fanout-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to build fanout pool: {}", e);
                return CycleReport {
                    screens: screens.len(),
                    ..CycleReport::default()
                };
            }
        };
        debug!(
            "Fanning out {} screens on {} threads",
            screens.len(),
            self.settings.pool_size
        );

        let updated = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        pool.install(|| {
            screens.par_iter().for_each(|screen| {
                match self.refresh_screen(screen) {
                    Ok(n) => {
                        updated.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        error!("An error occurred when retrieving device asset {}: {}", screen, e);
                    }
                }
            });
        });

        CycleReport {
            screens: screens.len(),
            updated: updated.into_inner(),
            failed: failed.into_inner(),
        }
    }

    /// Fetches every non-screen profile for one screen; returns documents stored.
    fn refresh_screen(&self, screen: &str) -> Result<usize, FetchError> {
        let mut stored = 0;
        for profile in ProfileType::ALL {
            if profile == ProfileType::NovastarScreen {
                continue;
            }
            if !self.is_running() {
                break;
            }

            let params = asset_query(profile, Some(screen));
            let response = self.fetcher.fetch(ASSETS_PATH, &params).inspect_err(|_| {
                self.metrics
                    .fetch_failures
                    .with_label_values(&[profile.wire_token()])
                    .inc();
            })?;

            if is_error_payload(&response) {
                warn!("No data for {}", describe(ASSETS_PATH, &params));
                self.metrics
                    .fetch_failures
                    .with_label_values(&[profile.wire_token()])
                    .inc();
                continue;
            }
            // The listing may have pruned this screen while the fetch was in flight.
            if !self.cache.update_existing(screen, profile, response) {
                debug!("Screen {} no longer listed, dropping fetched documents", screen);
                break;
            }
            stored += 1;
        }
        Ok(stored)
    }

    /// Signals the worker loop and in-flight tasks to stop.
    pub fn stop(&self) {
        self.in_progress.store(false, Ordering::Release);
    }

    /// Re-arms a stopped collector and schedules an immediate cycle.
    pub fn reset(&self) {
        self.in_progress.store(true, Ordering::Release);
        self.next_cycle_at_ms.store(0, Ordering::Release);
    }

    /// Worker loop; returns when [`stop`](Self::stop) is called.
    fn run(&self) {
        debug!("Collector loop started");
        while self.is_running() {
            thread::sleep(LOOP_SLEEP);
            if !self.is_running() {
                break;
            }
            if self.step() == StepOutcome::Paused {
                continue;
            }
            loop {
                let remaining = self.time_until_next_cycle();
                if remaining.is_zero() || !self.is_running() {
                    break;
                }
                thread::sleep(remaining.min(WAIT_SLEEP));
            }
        }
        debug!("Collector loop stopped");
    }
}

/// Owns the collector's background thread.
pub struct CollectorWorker {
    collector: Arc<Collector>,
    handle: Option<JoinHandle<()>>,
}

impl CollectorWorker {
    pub fn spawn(collector: Arc<Collector>) -> std::io::Result<Self> {
        collector.in_progress.store(true, Ordering::Release);
        let worker = collector.clone();
        let handle = thread::Builder::new()
            .name("nanosuite-collector".into())
            .spawn(move || worker.run())?;
        info!("Collector worker started");
        Ok(Self {
            collector,
            handle: Some(handle),
        })
    }

    /// Stops the loop and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.collector.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Collector worker panicked");
            }
            info!("Collector worker stopped");
        }
    }
}

impl Drop for CollectorWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
