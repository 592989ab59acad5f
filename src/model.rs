//! Wire and output data types.
//!
//! Upstream documents are loosely typed: ids and `lastValue` fields arrive
//! either as JSON strings or as bare numbers. Every scalar is therefore read
//! through a lenient deserializer that stringifies numbers and booleans and
//! maps `null` to `None`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::catalog::NONE;

/// Flat property map; ordered so that output is stable across runs.
pub type PropertyMap = BTreeMap<String, String>;

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// Fixed-shape asset metadata.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceMetadata {
    #[serde(deserialize_with = "lenient_string")]
    pub subsystem_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub subsystem_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub novastar_port: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub novastar_chain: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub novastar_screen: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub novastar_screen_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub novastar_sender: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub novastar_controller: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub novastar_controller_name: Option<String>,
}

/// A single metric sample, also used for the asset's overall health.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceMetric {
    #[serde(deserialize_with = "lenient_string")]
    pub metric_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub last_value: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub display_name: Option<String>,
}

/// One element of an asset document.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub profile_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub display_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub external_ref: Option<String>,
    pub metadata: Option<DeviceMetadata>,
    pub metrics: Option<Vec<DeviceMetric>>,
    #[serde(rename = "healthState")]
    pub overall_health_state: Option<DeviceMetric>,
}

impl AssetInfo {
    /// Decodes an asset document (a JSON array), skipping malformed elements.
    pub fn parse_document(document: &Value) -> Vec<AssetInfo> {
        let Some(items) = document.as_array() else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match AssetInfo::deserialize(item) {
                Ok(asset) => Some(asset),
                Err(e) => {
                    warn!("Skipping malformed asset element: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Aggregator-level facts from `api/v1/settings`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInformation {
    #[serde(deserialize_with = "lenient_string")]
    pub system_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub system_hostname: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub timezone: Option<String>,
}

impl SystemInformation {
    /// Projects the record onto its three published keys.
    pub fn to_statistics(&self) -> PropertyMap {
        [
            ("SystemName", &self.system_name),
            ("SystemHostname", &self.system_hostname),
            ("Timezone", &self.timezone),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), none_if_empty(value.as_deref())))
        .collect()
    }
}

/// Normalized per-screen record returned to the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedDevice {
    pub device_id: Option<String>,
    pub device_name: String,
    pub device_model: String,
    pub device_online: bool,
    pub properties: PropertyMap,
    pub dynamic_statistics: PropertyMap,
}

/// `None` literal for missing or empty values.
pub fn none_if_empty(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NONE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_accepts_numeric_ids() {
        let asset: AssetInfo = serde_json::from_value(json!({
            "profileType": "novastar_screen",
            "displayName": "Lobby Wall",
            "metadata": {"novastarScreen": 17, "subsystemId": "sub-1", "subsystemName": null},
            "metrics": [{"metricType": "novastar_screen_sender_input_valid", "lastValue": 2}],
            "healthState": {"lastValue": "0"}
        }))
        .unwrap();

        let metadata = asset.metadata.unwrap();
        assert_eq!(metadata.novastar_screen.as_deref(), Some("17"));
        assert_eq!(metadata.subsystem_name, None);
        assert_eq!(asset.metrics.unwrap()[0].last_value.as_deref(), Some("2"));
        assert_eq!(
            asset.overall_health_state.unwrap().last_value.as_deref(),
            Some("0")
        );
    }

    #[test]
    fn test_parse_document_skips_malformed_elements() {
        let doc = json!([
            {"profileType": "novastar_sender", "displayName": "A"},
            "not an object",
            {"profileType": "novastar_sender", "displayName": "B"}
        ]);
        let assets = AssetInfo::parse_document(&doc);
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[1].display_name.as_deref(), Some("B"));

        assert!(AssetInfo::parse_document(&json!({"error": "nope"})).is_empty());
    }

    #[test]
    fn test_system_information_projection() {
        let info: SystemInformation = serde_json::from_value(json!({
            "systemName": "ISAAC",
            "systemHostname": "isaac.local",
            "unrelated": 1
        }))
        .unwrap();
        let stats = info.to_statistics();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats["SystemName"], "ISAAC");
        assert_eq!(stats["SystemHostname"], "isaac.local");
        assert_eq!(stats["Timezone"], "None");
    }
}
