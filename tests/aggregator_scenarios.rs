//! End-to-end facade behaviour against a scripted upstream.
//!
//! No network: the upstream is an in-memory [`AssetFetcher`] keyed by the
//! unencoded request URI, and time only moves through [`ManualClock`].

use nanosuite_aggregator::client::{describe, AssetFetcher};
use nanosuite_aggregator::clock::ManualClock;
use nanosuite_aggregator::collector::StepOutcome;
use nanosuite_aggregator::metrics::AggregatorMetrics;
use nanosuite_aggregator::{Aggregator, AggregatorError, Config, FetchError, WorkerMode};
use prometheus::Registry;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SETTINGS: &str = "api/v1/settings";
const SCREENS: &str = "api/v1/infra/assets?profileType=novastar_screen";
const LOBBY_RECEIVERS: &str =
    "api/v1/infra/assets?profileType=novastar_receiver&metadata[novastarScreenName]=Lobby";
const LOBBY_SENDERS: &str =
    "api/v1/infra/assets?profileType=novastar_sender&metadata[novastarScreenName]=Lobby";

#[derive(Default)]
struct ScriptedUpstream {
    routes: Mutex<HashMap<String, Result<Value, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedUpstream {
    fn route(&self, uri: &str, response: Result<Value, FetchError>) {
        self.routes
            .lock()
            .unwrap()
            .insert(uri.to_string(), response);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AssetFetcher for ScriptedUpstream {
    fn fetch(&self, path: &str, params: &[(&'static str, String)]) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let uri = describe(path, params);
        self.routes
            .lock()
            .unwrap()
            .get(&uri)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Command(format!("unexpected request {uri}"))))
    }
}

struct Harness {
    upstream: Arc<ScriptedUpstream>,
    clock: Arc<ManualClock>,
    aggregator: Aggregator,
}

fn harness(config: Config) -> Harness {
    let upstream = Arc::new(ScriptedUpstream::default());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let aggregator = Aggregator::with_clock(
        config,
        upstream.clone(),
        AggregatorMetrics::new(&Registry::new()).unwrap(),
        clock.clone(),
        WorkerMode::Manual,
    );
    Harness {
        upstream,
        clock,
        aggregator,
    }
}

fn lobby_screen() -> Value {
    json!({
        "profileType": "novastar_screen",
        "displayName": "Lobby Wall",
        "metadata": {
            "novastarScreen": 17,
            "novastarScreenName": "Lobby",
            "subsystemId": "sub-1",
            "subsystemName": "Main Building"
        },
        "metrics": [
            {"metricType": "novastar_screen_sender_input_valid", "lastValue": "2"}
        ],
        "healthState": {"metricType": "novastar_screen_health", "lastValue": "0"}
    })
}

fn lobby_receivers() -> Value {
    json!([{
        "profileType": "novastar_receiver",
        "displayName": "Receiver card 1",
        "metadata": {"novastarScreen": 17, "novastarScreenName": "Lobby"},
        "metrics": [
            {"metricType": "novastar_receiver_temperature", "lastValue": "42.0"},
            {"metricType": "novastar_receiver_video_blackout", "lastValue": "false"}
        ]
    }])
}

fn lobby_senders() -> Value {
    json!([{
        "profileType": "novastar_sender",
        "displayName": "MCTRL4K, Main",
        "metadata": {"novastarScreen": 17, "novastarScreenName": "Lobby"},
        "metrics": [
            {"metricType": "novastar_sender_input_valid_dvi1", "lastValue": "true"}
        ],
        "healthState": {"lastValue": "1"}
    }])
}

fn script_lobby(upstream: &ScriptedUpstream) {
    upstream.route(
        SETTINGS,
        Ok(json!({"systemName": "ISAAC", "systemHostname": "isaac01", "timezone": "UTC"})),
    );
    upstream.route(SCREENS, Ok(json!([lobby_screen()])));
    upstream.route(LOBBY_RECEIVERS, Ok(lobby_receivers()));
    upstream.route(LOBBY_SENDERS, Ok(lobby_senders()));
}

/// Lists screens, then runs the first fanout cycle the way the worker would.
fn collect_once(h: &Harness) {
    h.aggregator.get_statistics().unwrap();
    assert!(h.aggregator.retrieve_multiple_statistics(None).is_empty());
    assert!(matches!(
        h.aggregator.collector().step(),
        StepOutcome::Cycled(_)
    ));
}

#[test]
fn test_empty_cache_returns_no_devices_and_fetches_nothing() {
    let h = harness(Config::default());

    assert!(h.aggregator.retrieve_multiple_statistics(None).is_empty());
    match h.aggregator.collector().step() {
        StepOutcome::Cycled(report) => assert_eq!(report.screens, 0),
        other => panic!("unexpected step outcome {other:?}"),
    }
    assert_eq!(h.upstream.calls(), 0);
}

#[test]
fn test_screen_only_entry_is_not_ready() {
    let h = harness(Config::default());
    script_lobby(&h.upstream);

    let stats = h.aggregator.get_statistics().unwrap();
    assert_eq!(stats["SystemName"], "ISAAC");
    assert_eq!(stats["SystemHostname"], "isaac01");
    assert_eq!(stats["Timezone"], "UTC");

    assert_eq!(h.aggregator.cache().len(), 1);
    assert!(h.aggregator.retrieve_multiple_statistics(None).is_empty());
}

#[test]
fn test_full_bundle_normalizes_one_device() {
    let h = harness(Config::default());
    script_lobby(&h.upstream);
    collect_once(&h);

    let devices = h.aggregator.retrieve_multiple_statistics(None);
    assert_eq!(devices.len(), 1);
    let device = &devices[0];

    assert_eq!(device.device_id.as_deref(), Some("17"));
    assert_eq!(device.device_name, "Lobby");
    assert!(device.device_online);
    assert!(device.dynamic_statistics.is_empty());

    let props = &device.properties;
    assert_eq!(props["ReceiverCard1#Temperature(C)"], "42");
    assert_eq!(props["ReceiverCard1#VideoBlackout"], "Normal");
    assert_eq!(props["ReceiverCard1#ProfileType"], "Novastar Receiver");
    assert_eq!(props["MCTRL4KMain#InputValidDVI1"], "Healthy");
    assert_eq!(props["MCTRL4KMain#HealthState"], "Warning");
    assert_eq!(props["LobbyWall#SenderInputValid"], "Error");
    assert_eq!(props["LobbyWall#HealthState"], "Healthy");
    assert_eq!(props["SubsystemName"], "Main Building");
    assert_eq!(props["SubsystemId"], "sub-1");
    assert!(props.values().all(|v| !v.is_empty()));
}

#[test]
fn test_historical_property_moves_to_dynamic_channel() {
    let config = Config {
        historical_properties: Some("Temperature(C)".into()),
        ..Config::default()
    };
    let h = harness(config);
    script_lobby(&h.upstream);
    collect_once(&h);

    let devices = h.aggregator.retrieve_multiple_statistics(None);
    let device = &devices[0];
    assert!(!device
        .properties
        .contains_key("ReceiverCard1#Temperature(C)"));
    assert_eq!(
        device.dynamic_statistics["ReceiverCard1#Temperature(C)"],
        "42"
    );
}

#[test]
fn test_device_id_filter() {
    let h = harness(Config::default());
    script_lobby(&h.upstream);
    collect_once(&h);

    let wanted = vec!["17".to_string()];
    assert_eq!(
        h.aggregator
            .retrieve_multiple_statistics(Some(&wanted))
            .len(),
        1
    );
    let other = vec!["99".to_string()];
    assert!(h
        .aggregator
        .retrieve_multiple_statistics(Some(&other))
        .is_empty());
}

#[test]
fn test_device_json_shape() {
    let h = harness(Config::default());
    script_lobby(&h.upstream);
    collect_once(&h);

    let devices = h.aggregator.retrieve_multiple_statistics(None);
    let value = serde_json::to_value(&devices[0]).unwrap();
    for key in [
        "deviceId",
        "deviceName",
        "deviceModel",
        "deviceOnline",
        "properties",
        "dynamicStatistics",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn test_collection_pauses_without_consumers() {
    let h = harness(Config::default());
    script_lobby(&h.upstream);
    collect_once(&h);
    let after_first_cycle = h.upstream.calls();

    // Still inside the liveness window: the 30 s cadence applies.
    h.clock.advance(Duration::from_secs(30));
    assert!(matches!(
        h.aggregator.collector().step(),
        StepOutcome::Cycled(_)
    ));
    let after_second_cycle = h.upstream.calls();
    assert_eq!(after_second_cycle, after_first_cycle + 2);

    // 181 s after the last consumer call nothing is fetched anymore.
    h.clock.advance(Duration::from_secs(151));
    for _ in 0..10 {
        assert_eq!(h.aggregator.collector().step(), StepOutcome::Paused);
        h.clock.advance(Duration::from_secs(30));
    }
    assert_eq!(h.upstream.calls(), after_second_cycle);
    assert!(h.aggregator.collector().is_paused());

    // The next consumer call resumes with an immediate cycle.
    assert_eq!(h.aggregator.retrieve_multiple_statistics(None).len(), 1);
    assert!(matches!(
        h.aggregator.collector().step(),
        StepOutcome::Cycled(_)
    ));
    assert_eq!(h.upstream.calls(), after_second_cycle + 2);
}

#[test]
fn test_upstream_failures_surface_from_get_statistics() {
    let h = harness(Config::default());
    h.upstream
        .route(SETTINGS, Err(FetchError::Auth("401 Unauthorized".into())));
    assert!(matches!(
        h.aggregator.get_statistics(),
        Err(AggregatorError::Login(_))
    ));

    h.upstream.route(SETTINGS, Ok(json!({})));
    h.upstream
        .route(SCREENS, Err(FetchError::Command("connection refused".into())));
    assert!(matches!(
        h.aggregator.get_statistics(),
        Err(AggregatorError::ResourceNotReachable { .. })
    ));
}

#[test]
fn test_failing_screen_does_not_block_others() {
    let h = harness(Config::default());
    script_lobby(&h.upstream);
    let mut hall = lobby_screen();
    hall["metadata"]["novastarScreenName"] = json!("Hall");
    hall["metadata"]["novastarScreen"] = json!(18);
    h.upstream
        .route(SCREENS, Ok(json!([lobby_screen(), hall])));
    // Hall's receiver and sender routes are missing and fail.

    h.aggregator.get_statistics().unwrap();
    h.aggregator.retrieve_multiple_statistics(None);
    match h.aggregator.collector().step() {
        StepOutcome::Cycled(report) => {
            assert_eq!(report.screens, 2);
            assert_eq!(report.failed, 1);
        }
        other => panic!("unexpected step outcome {other:?}"),
    }
    // Hall stays incomplete, so the snapshot is withheld.
    assert!(h.aggregator.retrieve_multiple_statistics(None).is_empty());

    // Hall disappears upstream and is pruned; Lobby is complete.
    h.upstream.route(SCREENS, Ok(json!([lobby_screen()])));
    h.aggregator.get_statistics().unwrap();
    assert_eq!(h.aggregator.retrieve_multiple_statistics(None).len(), 1);
}

#[test]
fn test_error_payload_is_skipped() {
    let h = harness(Config::default());
    script_lobby(&h.upstream);
    h.upstream
        .route(LOBBY_SENDERS, Ok(json!({"error": "not found"})));
    collect_once(&h);

    let devices = h.aggregator.retrieve_multiple_statistics(None);
    assert_eq!(devices.len(), 1);
    assert!(!devices[0]
        .properties
        .contains_key("MCTRL4KMain#InputValidDVI1"));
}

#[test]
fn test_destroy_clears_cache() {
    let h = harness(Config::default());
    script_lobby(&h.upstream);
    collect_once(&h);

    h.aggregator.destroy();
    assert!(h.aggregator.cache().is_empty());
    assert!(h.aggregator.retrieve_multiple_statistics(None).is_empty());
}
