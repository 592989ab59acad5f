//! Normalization of cached asset documents into flat device records.
//!
//! Each screen's bundle of documents becomes one [`AggregatedDevice`]. Every
//! asset contributes properties under a group prefix derived from its
//! display name (`"MCTRL4K, main"` becomes `MCTRL4KMain#`). Receiver
//! metrics listed in the historical set go to the dynamic map instead of
//! the static one. The output is a pure function of the input bundle and
//! the options.

use ahash::AHashSet as HashSet;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::cache::ProfileDocuments;
use crate::catalog::{
    screen_metric_name, HealthState, MetricValueMapping, ProfileType, ReceiverMetric,
    SenderMetric, NONE,
};
use crate::model::{none_if_empty, AggregatedDevice, AssetInfo, DeviceMetric, PropertyMap};

const PROFILE_TYPE_KEY: &str = "ProfileType";
const HEALTH_STATE_KEY: &str = "HealthState";
const SUBSYSTEM_NAME_KEY: &str = "SubsystemName";
const SUBSYSTEM_ID_KEY: &str = "SubsystemId";

/// Options that shape normalization output.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Receiver metric names routed to the historical channel.
    pub historical_properties: HashSet<String>,
}

/// Normalizes every screen in `snapshot`, in screen-name order.
pub fn normalize_all(
    snapshot: &BTreeMap<String, ProfileDocuments>,
    options: &NormalizeOptions,
) -> Vec<AggregatedDevice> {
    snapshot
        .par_iter()
        .map(|(name, documents)| normalize_screen(name, documents, options))
        .collect()
}

/// Builds the device record for one screen.
pub fn normalize_screen(
    screen_name: &str,
    documents: &ProfileDocuments,
    options: &NormalizeOptions,
) -> AggregatedDevice {
    let mut device = AggregatedDevice {
        device_id: None,
        device_name: screen_name.to_string(),
        device_model: screen_name.to_string(),
        device_online: true,
        properties: PropertyMap::new(),
        dynamic_statistics: PropertyMap::new(),
    };
    let mut health_seen = false;
    let mut any_not_error = false;

    // Fixed profile order keeps last-writer-wins deterministic; the screen
    // document goes last so its metadata wins for deviceId.
    for profile in ProfileType::ALL {
        let Some(document) = documents.get(&profile) else {
            continue;
        };
        for asset in AssetInfo::parse_document(document) {
            if let Some(health) = populate_asset(&asset, &mut device, options) {
                health_seen = true;
                any_not_error |= health != HealthState::Error;
            }
        }
    }

    if health_seen {
        device.device_online = any_not_error;
    }
    debug!(
        "Normalized screen {}: {} properties, {} dynamic",
        screen_name,
        device.properties.len(),
        device.dynamic_statistics.len()
    );
    device
}

/// Emits one asset's properties; returns its decoded overall health.
fn populate_asset(
    asset: &AssetInfo,
    device: &mut AggregatedDevice,
    options: &NormalizeOptions,
) -> Option<HealthState> {
    if let Some(metadata) = &asset.metadata {
        if let Some(id) = metadata.novastar_screen.as_deref().filter(|id| !id.is_empty()) {
            device.device_id = Some(id.to_string());
        }
        device.properties.insert(
            SUBSYSTEM_NAME_KEY.to_string(),
            none_if_empty(metadata.subsystem_name.as_deref()),
        );
        device.properties.insert(
            SUBSYSTEM_ID_KEY.to_string(),
            none_if_empty(metadata.subsystem_id.as_deref()),
        );
    }

    let profile = asset.profile_type.as_deref().and_then(ProfileType::from_token);
    let prefix = match asset.display_name.as_deref() {
        Some(name) if !name.is_empty() => group_prefix(name),
        _ => profile
            .map(|p| group_prefix(p.label()))
            .unwrap_or_else(|| group_prefix(NONE)),
    };

    let metrics = asset.metrics.as_deref().unwrap_or_default();
    match profile {
        Some(profile) if !metrics.is_empty() => {
            device.properties.insert(
                format!("{prefix}{PROFILE_TYPE_KEY}"),
                profile.label().to_string(),
            );
            for metric in metrics {
                emit_metric(profile, &prefix, metric, device, options);
            }
        }
        Some(_) => {}
        None => warn!(
            "Unknown profile type {:?} on asset {}",
            asset.profile_type, prefix
        ),
    }

    let health = asset.overall_health_state.as_ref()?;
    let decoded = health.last_value.as_deref().and_then(HealthState::parse);
    device.properties.insert(
        format!("{prefix}{HEALTH_STATE_KEY}"),
        decoded.map_or(NONE, HealthState::label).to_string(),
    );
    decoded
}

fn emit_metric(
    profile: ProfileType,
    prefix: &str,
    metric: &DeviceMetric,
    device: &mut AggregatedDevice,
    options: &NormalizeOptions,
) {
    let token = metric.metric_type.as_deref().unwrap_or_default();
    let value = none_if_empty(metric.last_value.as_deref());

    match profile {
        ProfileType::NovastarReceiver => {
            let Some(receiver) = ReceiverMetric::from_token(token) else {
                warn!("Unknown receiver metric {:?} under {}", token, prefix);
                return;
            };
            let name = receiver.name();
            let key = format!("{prefix}{name}");
            if options.historical_properties.contains(name) && value != NONE {
                device.dynamic_statistics.insert(key, round_value(&value));
            } else if is_numeric(&value) {
                device.properties.insert(key, round_value(&value));
            } else {
                device
                    .properties
                    .insert(key, MetricValueMapping::apply(name, &value));
            }
        }
        ProfileType::NovastarSender => {
            let Some(sender) = SenderMetric::from_token(token) else {
                warn!("Unknown sender metric {:?} under {}", token, prefix);
                return;
            };
            let name = sender.name();
            device.properties.insert(
                format!("{prefix}{name}"),
                MetricValueMapping::apply(name, &value),
            );
        }
        ProfileType::NovastarScreen => {
            let Some(name) = screen_metric_name(token) else {
                debug!("Skipping screen metric {:?} under {}", token, prefix);
                return;
            };
            let label = HealthState::parse(&value).map_or(NONE, HealthState::label);
            device
                .properties
                .insert(format!("{prefix}{name}"), label.to_string());
        }
    }
}

/// Title-cases each space-separated word, joins them and drops commas.
pub fn group_prefix(display_name: &str) -> String {
    let mut out: String = display_name.split(' ').map(capitalize_first).collect();
    out.retain(|c| c != ',');
    out.push('#');
    out
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_numeric(value: &str) -> bool {
    value.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Renders integral values without a decimal point; `None` on parse failure.
pub fn round_value(value: &str) -> String {
    if value.eq_ignore_ascii_case(NONE) {
        return value.to_string();
    }
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() && number.fract() == 0.0 && number.abs() < 9.0e18 => {
            format!("{}", number as i64)
        }
        Ok(number) => format!("{number}"),
        Err(_) => NONE.to_string(),
    }
}
