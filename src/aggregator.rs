//! Facade exposed to the host: aggregator facts and device snapshots.
//!
//! Both entry points are serialized by one facade lock. `get_statistics`
//! refreshes system information and the screen listing synchronously;
//! `retrieve_multiple_statistics` keeps the collector alive and returns
//! the normalized snapshot once every cached screen is complete.

use ahash::AHashSet as HashSet;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::AssetCache;
use crate::catalog::ProfileType;
use crate::client::{asset_query, describe, is_error_payload, AssetFetcher, ASSETS_PATH, SETTINGS_PATH};
use crate::clock::{Clock, SystemClock};
use crate::collector::{Collector, CollectorSettings, CollectorWorker};
use crate::config::Config;
use crate::error::{AggregatorError, FetchError};
use crate::metrics::AggregatorMetrics;
use crate::model::{AggregatedDevice, PropertyMap, SystemInformation};
use crate::normalizer::{normalize_all, NormalizeOptions};
use crate::probe::ReachabilityProbe;

const SYSTEM_INFORMATION: &str = "system information";
const SCREEN_LISTING: &str = "screens information";

/// How the collector thread is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Spawned lazily on the first device snapshot request.
    Background,
    /// Never spawned; the caller drives [`Collector::step`] or
    /// [`Collector::run_cycle`] itself.
    Manual,
}

#[derive(Default)]
struct FacadeState {
    system_information: SystemInformation,
    worker: Option<CollectorWorker>,
}

pub struct Aggregator {
    config: Config,
    fetcher: Arc<dyn AssetFetcher>,
    cache: Arc<AssetCache>,
    collector: Arc<Collector>,
    metrics: AggregatorMetrics,
    options: NormalizeOptions,
    probe: ReachabilityProbe,
    mode: WorkerMode,
    state: Mutex<FacadeState>,
}

impl Aggregator {
    /// Production facade: wall clock and a background collector thread.
    pub fn new(config: Config, fetcher: Arc<dyn AssetFetcher>, metrics: AggregatorMetrics) -> Self {
        Self::with_clock(
            config,
            fetcher,
            metrics,
            Arc::new(SystemClock),
            WorkerMode::Background,
        )
    }

    pub fn with_clock(
        config: Config,
        fetcher: Arc<dyn AssetFetcher>,
        metrics: AggregatorMetrics,
        clock: Arc<dyn Clock>,
        mode: WorkerMode,
    ) -> Self {
        let cache = Arc::new(AssetCache::new());
        let collector = Arc::new(Collector::new(
            cache.clone(),
            fetcher.clone(),
            clock,
            metrics.clone(),
            CollectorSettings::from_config(&config),
        ));
        let options = NormalizeOptions {
            historical_properties: config.historical_properties(),
        };
        let probe = ReachabilityProbe::from_config(&config);

        Self {
            config,
            fetcher,
            cache,
            collector,
            metrics,
            options,
            probe,
            mode,
            state: Mutex::new(FacadeState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FacadeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    pub fn probe(&self) -> &ReachabilityProbe {
        &self.probe
    }

    /// Refreshes aggregator facts and the screen listing.
    ///
    /// Returns `SystemName`, `SystemHostname` and `Timezone`, with `None`
    /// for missing values.
    #[instrument(skip(self))]
    pub fn get_statistics(&self) -> Result<PropertyMap, AggregatorError> {
        self.metrics
            .statistics_requests
            .with_label_values(&["get_statistics"])
            .inc();
        let mut state = self.lock();

        self.refresh_system_information(&mut state)?;
        self.refresh_screen_listing()?;

        Ok(state.system_information.to_statistics())
    }

    fn refresh_system_information(&self, state: &mut FacadeState) -> Result<(), AggregatorError> {
        match self.fetcher.fetch(SETTINGS_PATH, &[]) {
            Ok(value) if is_error_payload(&value) => {
                warn!("No data for {}", SETTINGS_PATH);
            }
            Ok(value) => match serde_json::from_value::<SystemInformation>(value) {
                Ok(info) => state.system_information = info,
                Err(e) => error!("Failed to decode {}: {}", SYSTEM_INFORMATION, e),
            },
            Err(e) => return classify(SYSTEM_INFORMATION, e),
        }
        Ok(())
    }

    fn refresh_screen_listing(&self) -> Result<(), AggregatorError> {
        let params = asset_query(ProfileType::NovastarScreen, self.config.screen_name_filter());
        let listing = match self.fetcher.fetch(ASSETS_PATH, &params) {
            Ok(value) => value,
            Err(e) => return classify(SCREEN_LISTING, e),
        };
        if is_error_payload(&listing) {
            warn!("No data for {}", describe(ASSETS_PATH, &params));
            return Ok(());
        }
        let Value::Array(screens) = listing else {
            warn!("Unexpected screen listing shape, expected an array");
            return Ok(());
        };

        let mut listed = HashSet::with_capacity(screens.len());
        for screen in screens {
            let Some(name) = screen
                .pointer("/metadata/novastarScreenName")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
            else {
                debug!("Skipping screen listing element without a screen name");
                continue;
            };
            self.cache
                .upsert(&name, ProfileType::NovastarScreen, json!([screen]));
            listed.insert(name);
        }

        let removed = self.cache.retain(&listed);
        if removed > 0 {
            info!("Dropped {} screens no longer listed upstream", removed);
        }
        self.metrics.cache_screens.set(self.cache.len() as f64);
        debug!("Screen listing holds {} screens", listed.len());
        Ok(())
    }

    /// Normalized device snapshot, optionally restricted to `device_ids`.
    ///
    /// Keeps the collector unpaused and starts it on first use. Returns an
    /// empty list while any cached screen still lacks its sender or
    /// receiver documents.
    #[instrument(skip(self))]
    pub fn retrieve_multiple_statistics(&self, device_ids: Option<&[String]>) -> Vec<AggregatedDevice> {
        self.metrics
            .statistics_requests
            .with_label_values(&["retrieve_multiple_statistics"])
            .inc();
        let mut state = self.lock();

        self.collector.touch();
        if self.mode == WorkerMode::Background && state.worker.is_none() {
            match CollectorWorker::spawn(self.collector.clone()) {
                Ok(worker) => state.worker = Some(worker),
                Err(e) => error!("Failed to start collector worker: {}", e),
            }
        }

        if self.cache.has_incomplete() {
            debug!("Device documents not complete yet, returning no devices");
            self.metrics.devices_exported.set(0.0);
            return Vec::new();
        }

        let mut devices = normalize_all(&self.cache.snapshot_all(), &self.options);
        if let Some(ids) = device_ids {
            devices.retain(|device| {
                device
                    .device_id
                    .as_ref()
                    .is_some_and(|id| ids.iter().any(|wanted| wanted == id))
            });
        }
        self.metrics.devices_exported.set(devices.len() as f64);
        devices
    }

    /// Stops the collector and clears cached state. Safe to call twice.
    pub fn destroy(&self) {
        let mut state = self.lock();
        if let Some(worker) = state.worker.take() {
            worker.stop();
        } else {
            self.collector.stop();
        }
        self.collector.reset();
        self.cache.clear();
        state.system_information = SystemInformation::default();
        self.metrics.cache_screens.set(0.0);
        debug!("Aggregator state cleared");
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        if let Some(worker) = self.lock().worker.take() {
            worker.stop();
        }
    }
}

fn classify(context: &'static str, err: FetchError) -> Result<(), AggregatorError> {
    match err {
        FetchError::Auth(msg) => Err(AggregatorError::Login(msg)),
        err @ FetchError::Command(_) => Err(AggregatorError::ResourceNotReachable {
            context,
            source: err,
        }),
        FetchError::Decode(msg) => {
            error!("An error occurred when retrieving the {}: {}", context, msg);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use prometheus::Registry;
    use std::collections::HashMap;

    /// Answers by `describe(path, params)`; unknown URIs fail with `Command`.
    struct StaticFetcher {
        responses: HashMap<String, Result<Value, FetchError>>,
    }

    impl AssetFetcher for StaticFetcher {
        fn fetch(&self, path: &str, params: &[(&'static str, String)]) -> Result<Value, FetchError> {
            let uri = describe(path, params);
            self.responses
                .get(&uri)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Command(format!("no route for {uri}"))))
        }
    }

    fn aggregator(responses: Vec<(&str, Result<Value, FetchError>)>, config: Config) -> Aggregator {
        let fetcher = StaticFetcher {
            responses: responses
                .into_iter()
                .map(|(uri, r)| (uri.to_string(), r))
                .collect(),
        };
        Aggregator::with_clock(
            config,
            Arc::new(fetcher),
            AggregatorMetrics::new(&Registry::new()).unwrap(),
            Arc::new(ManualClock::new(1_000_000)),
            WorkerMode::Manual,
        )
    }

    fn screen(name: &str, id: u32) -> Value {
        json!({
            "profileType": "novastar_screen",
            "displayName": name,
            "metadata": {"novastarScreen": id, "novastarScreenName": name},
            "metrics": []
        })
    }

    #[test]
    fn test_get_statistics_projection() {
        let agg = aggregator(
            vec![
                (
                    "api/v1/settings",
                    Ok(json!({"systemName": "ISAAC", "timezone": "UTC", "extra": 1})),
                ),
                ("api/v1/infra/assets?profileType=novastar_screen", Ok(json!([]))),
            ],
            Config::default(),
        );
        let stats = agg.get_statistics().unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats["SystemName"], "ISAAC");
        assert_eq!(stats["SystemHostname"], "None");
        assert_eq!(stats["Timezone"], "UTC");
    }

    #[test]
    fn test_auth_failure_is_login_error() {
        let agg = aggregator(
            vec![("api/v1/settings", Err(FetchError::Auth("401".into())))],
            Config::default(),
        );
        assert!(matches!(agg.get_statistics(), Err(AggregatorError::Login(_))));
    }

    #[test]
    fn test_listing_failure_is_resource_not_reachable() {
        let agg = aggregator(vec![("api/v1/settings", Ok(json!({})))], Config::default());
        let err = agg.get_statistics().unwrap_err();
        assert!(matches!(
            err,
            AggregatorError::ResourceNotReachable { context: SCREEN_LISTING, .. }
        ));
        assert_eq!(err.to_string(), "An error occurred when retrieving the screens information");
    }

    #[test]
    fn test_listing_upserts_and_prunes() {
        let agg = aggregator(
            vec![
                ("api/v1/settings", Ok(json!({}))),
                (
                    "api/v1/infra/assets?profileType=novastar_screen",
                    Ok(json!([screen("A", 1), screen("B", 2), {"metadata": {}}])),
                ),
            ],
            Config::default(),
        );
        agg.cache()
            .upsert("Gone", ProfileType::NovastarScreen, json!([]));

        agg.get_statistics().unwrap();
        let mut keys = agg.cache().snapshot_keys();
        keys.sort();
        assert_eq!(keys, vec!["A".to_string(), "B".to_string()]);

        let all = agg.cache().snapshot_all();
        assert_eq!(*all["A"][&ProfileType::NovastarScreen], json!([screen("A", 1)]));
    }

    #[test]
    fn test_unusable_listing_keeps_cached_screens() {
        let listings = [
            json!({"error": "Unauthorized"}),
            Value::Null,
            json!({"items": [screen("B", 2)]}),
        ];
        for listing in listings {
            let agg = aggregator(
                vec![
                    ("api/v1/settings", Ok(json!({}))),
                    ("api/v1/infra/assets?profileType=novastar_screen", Ok(listing.clone())),
                ],
                Config::default(),
            );
            agg.cache()
                .upsert("A", ProfileType::NovastarScreen, json!([screen("A", 1)]));

            agg.get_statistics().unwrap();
            assert_eq!(agg.cache().snapshot_keys(), vec!["A".to_string()], "listing {listing}");
        }
    }

    #[test]
    fn test_filtered_listing_uses_filter_parameter() {
        let config = Config {
            screen_name_filter: Some("Lobby".into()),
            ..Config::default()
        };
        let agg = aggregator(
            vec![
                ("api/v1/settings", Ok(json!({}))),
                (
                    "api/v1/infra/assets?profileType=novastar_screen&metadata[novastarScreenName]=Lobby",
                    Ok(json!([screen("Lobby", 4)])),
                ),
            ],
            config,
        );
        agg.get_statistics().unwrap();
        assert_eq!(agg.cache().snapshot_keys(), vec!["Lobby".to_string()]);
    }

    #[test]
    fn test_readiness_gate_and_id_filter() {
        let agg = aggregator(vec![], Config::default());
        assert!(agg.retrieve_multiple_statistics(None).is_empty());

        agg.cache()
            .upsert("A", ProfileType::NovastarScreen, json!([screen("A", 1)]));
        assert!(agg.retrieve_multiple_statistics(None).is_empty());

        agg.cache()
            .upsert("A", ProfileType::NovastarReceiver, json!([]));
        agg.cache()
            .upsert("B", ProfileType::NovastarScreen, json!([screen("B", 2)]));
        agg.cache()
            .upsert("B", ProfileType::NovastarSender, json!([]));

        let all = agg.retrieve_multiple_statistics(None);
        assert_eq!(all.len(), 2);

        let only_b = agg.retrieve_multiple_statistics(Some(&["2".to_string()]));
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].device_name, "B");
    }

    #[test]
    fn test_destroy_clears_state() {
        let agg = aggregator(vec![], Config::default());
        agg.cache()
            .upsert("A", ProfileType::NovastarScreen, json!([]));
        agg.retrieve_multiple_statistics(None);
        assert!(!agg.collector().is_paused());

        agg.destroy();
        assert!(agg.cache().is_empty());
        assert!(agg.collector().is_running());
        agg.destroy();
    }
}
