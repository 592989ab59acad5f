//! Static profile and metric catalog.
//!
//! Upstream assets carry opaque `metricType` tokens. Every receiver and
//! sender metric owns two tokens: one used inside its own profile
//! (`novastar_receiver_*`, `novastar_sender_*`) and one used when the same
//! metric is reported as a health code on the screen profile
//! (`novastar_screen_receiver_*`, `novastar_screen_sender_*`). Both resolve
//! to the same canonical metric. Lookups are case-insensitive and never fail
//! loudly: unknown tokens resolve to `None`.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;

/// Literal emitted for missing or undecodable values.
pub const NONE: &str = "None";

/// Asset profile discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProfileType {
    NovastarReceiver,
    NovastarSender,
    NovastarScreen,
}

impl ProfileType {
    pub const ALL: [ProfileType; 3] = [
        ProfileType::NovastarReceiver,
        ProfileType::NovastarSender,
        ProfileType::NovastarScreen,
    ];

    /// Token used in `profileType` fields and query parameters.
    pub fn wire_token(self) -> &'static str {
        match self {
            ProfileType::NovastarReceiver => "novastar_receiver",
            ProfileType::NovastarSender => "novastar_sender",
            ProfileType::NovastarScreen => "novastar_screen",
        }
    }

    /// Human readable label emitted as `<group>ProfileType`.
    pub fn label(self) -> &'static str {
        match self {
            ProfileType::NovastarReceiver => "Novastar Receiver",
            ProfileType::NovastarSender => "Novastar Sender",
            ProfileType::NovastarScreen => "Novastar Screen",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.wire_token().eq_ignore_ascii_case(token.trim()))
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_token())
    }
}

/// Receiver card metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverMetric {
    BrightnessBlue,
    BrightnessGreen,
    BrightnessRed,
    BrightnessVRed,
    Brightness,
    Gamma,
    Model,
    Temperature,
    VersionFpga,
    VersionMcu,
    VersionSoftware,
    VideoBlackout,
    VideoFreeze,
    VideoMapping,
    VideoTest,
    Voltage,
}

/// (metric, display name, receiver token, screen token), in declaration order.
const RECEIVER_TABLE: &[(ReceiverMetric, &str, &str, &str)] = &[
    (ReceiverMetric::BrightnessBlue, "BrightnessBlue", "novastar_receiver_brightness_blue", "novastar_screen_receiver_brightness_blue"),
    (ReceiverMetric::BrightnessGreen, "BrightnessGreen", "novastar_receiver_brightness_green", "novastar_screen_receiver_brightness_green"),
    (ReceiverMetric::BrightnessRed, "BrightnessRed", "novastar_receiver_brightness_red", "novastar_screen_receiver_brightness_red"),
    (ReceiverMetric::BrightnessVRed, "BrightnessVRed", "novastar_receiver_brightness_vred", "novastar_screen_receiver_brightness_vred"),
    (ReceiverMetric::Brightness, "Brightness", "novastar_receiver_brightness", "novastar_screen_receiver_brightness"),
    (ReceiverMetric::Gamma, "Gamma", "novastar_receiver_gamma", "novastar_screen_receiver_gamma"),
    (ReceiverMetric::Model, "Model", "novastar_receiver_model", "novastar_screen_receiver_model"),
    (ReceiverMetric::Temperature, "Temperature(C)", "novastar_receiver_temperature", "novastar_screen_receiver_temperature"),
    (ReceiverMetric::VersionFpga, "VersionFPGA", "novastar_receiver_version_fpga", "novastar_screen_receiver_version_fpga"),
    (ReceiverMetric::VersionMcu, "VersionMCU", "novastar_receiver_version_mcu", "novastar_screen_receiver_version_mcu"),
    (ReceiverMetric::VersionSoftware, "VersionSoftware", "novastar_receiver_version_software", "novastar_screen_receiver_version_software"),
    (ReceiverMetric::VideoBlackout, "VideoBlackout", "novastar_receiver_video_blackout", "novastar_screen_receiver_video_blackout"),
    (ReceiverMetric::VideoFreeze, "VideoFreeze", "novastar_receiver_video_freeze", "novastar_screen_receiver_video_freeze"),
    (ReceiverMetric::VideoMapping, "VideoMapping", "novastar_receiver_video_mapping", "novastar_screen_receiver_video_mapping"),
    (ReceiverMetric::VideoTest, "VideoTest", "novastar_receiver_video_test", "novastar_screen_receiver_video_test"),
    (ReceiverMetric::Voltage, "Voltage(V)", "novastar_receiver_voltage", "novastar_screen_receiver_voltage"),
];

/// Misspelled tokens seen in the wild, accepted in addition to the table.
const RECEIVER_ALIASES: &[(ReceiverMetric, &str)] = &[(
    ReceiverMetric::BrightnessBlue,
    "novastar_screen,receiver_brightness_blue",
)];

static RECEIVER_BY_TOKEN: Lazy<HashMap<String, ReceiverMetric>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (metric, _, token, screen_token) in RECEIVER_TABLE {
        map.insert(token.to_ascii_lowercase(), *metric);
        map.insert(screen_token.to_ascii_lowercase(), *metric);
    }
    for (metric, alias) in RECEIVER_ALIASES {
        map.insert(alias.to_ascii_lowercase(), *metric);
    }
    map
});

impl ReceiverMetric {
    fn entry(self) -> &'static (ReceiverMetric, &'static str, &'static str, &'static str) {
        &RECEIVER_TABLE[self as usize]
    }

    /// Canonical display name, used as the property key suffix.
    pub fn name(self) -> &'static str {
        self.entry().1
    }

    pub fn token(self) -> &'static str {
        self.entry().2
    }

    pub fn screen_token(self) -> &'static str {
        self.entry().3
    }

    pub fn from_token(token: &str) -> Option<Self> {
        RECEIVER_BY_TOKEN
            .get(&token.trim().to_ascii_lowercase())
            .copied()
    }

    pub fn all() -> impl Iterator<Item = ReceiverMetric> {
        RECEIVER_TABLE.iter().map(|(m, ..)| *m)
    }
}

/// Sender (video controller) metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderMetric {
    InputSource,
    InputValidDisplayPort,
    InputValidDvi1,
    InputValidDvi2,
    InputValidDvi3,
    InputValidDvi4,
    InputValidHdmi,
    InputValidSdi,
    InputValid,
    Model,
    SerialNumber,
    VersionFpga,
    VersionMcu,
}

/// Same layout as `RECEIVER_TABLE`.
const SENDER_TABLE: &[(SenderMetric, &str, &str, &str)] = &[
    (SenderMetric::InputSource, "InputSource", "novastar_sender_input_source", "novastar_screen_sender_input_source"),
    (SenderMetric::InputValidDisplayPort, "InputValidDisplayPort", "novastar_sender_input_valid_displayport", "novastar_screen_sender_input_valid_displayport"),
    (SenderMetric::InputValidDvi1, "InputValidDVI1", "novastar_sender_input_valid_dvi1", "novastar_screen_sender_input_valid_dvi1"),
    (SenderMetric::InputValidDvi2, "InputValidDVI2", "novastar_sender_input_valid_dvi2", "novastar_screen_sender_input_valid_dvi2"),
    (SenderMetric::InputValidDvi3, "InputValidDVI3", "novastar_sender_input_valid_dvi3", "novastar_screen_sender_input_valid_dvi3"),
    (SenderMetric::InputValidDvi4, "InputValidDVI4", "novastar_sender_input_valid_dvi4", "novastar_screen_sender_input_valid_dvi4"),
    (SenderMetric::InputValidHdmi, "InputValidHDMI", "novastar_sender_input_valid_HDMI", "novastar_screen_sender_input_valid_HDMI"),
    (SenderMetric::InputValidSdi, "InputValidSDI", "novastar_sender_input_valid_sdi", "novastar_screen_sender_input_valid_sdi"),
    (SenderMetric::InputValid, "InputValid", "novastar_sender_input_valid", "novastar_screen_sender_input_valid"),
    (SenderMetric::Model, "Model", "novastar_sender_model", "novastar_screen_sender_model"),
    (SenderMetric::SerialNumber, "SerialNumber", "novastar_sender_serialnumber", "novastar_screen_sender_serialnumber"),
    (SenderMetric::VersionFpga, "VersionFPGA", "novastar_sender_version_fpga", "novastar_screen_sender_version_fpga"),
    (SenderMetric::VersionMcu, "VersionMCU", "novastar_sender_version_mcu", "novastar_screen_sender_version_mcu"),
];

static SENDER_BY_TOKEN: Lazy<HashMap<String, SenderMetric>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (metric, _, token, screen_token) in SENDER_TABLE {
        map.insert(token.to_ascii_lowercase(), *metric);
        map.insert(screen_token.to_ascii_lowercase(), *metric);
    }
    map
});

impl SenderMetric {
    fn entry(self) -> &'static (SenderMetric, &'static str, &'static str, &'static str) {
        &SENDER_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    pub fn token(self) -> &'static str {
        self.entry().2
    }

    pub fn screen_token(self) -> &'static str {
        self.entry().3
    }

    pub fn from_token(token: &str) -> Option<Self> {
        SENDER_BY_TOKEN
            .get(&token.trim().to_ascii_lowercase())
            .copied()
    }

    pub fn all() -> impl Iterator<Item = SenderMetric> {
        SENDER_TABLE.iter().map(|(m, ..)| *m)
    }
}

/// Resolves a metric reported on the screen profile.
///
/// The sender catalog is consulted first, then the receiver catalog. The
/// result is qualified with its group, e.g. `SenderInputValid` or
/// `ReceiverTemperature(C)`.
pub fn screen_metric_name(token: &str) -> Option<String> {
    if let Some(sender) = SenderMetric::from_token(token) {
        return Some(format!("Sender{}", sender.name()));
    }
    ReceiverMetric::from_token(token).map(|receiver| format!("Receiver{}", receiver.name()))
}

/// Health code domain shared by overall asset health and screen metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HealthState {
    Healthy,
    Warning,
    Error,
    Unknown,
}

impl HealthState {
    pub fn code(self) -> i32 {
        match self {
            HealthState::Healthy => 0,
            HealthState::Warning => 1,
            HealthState::Error => 2,
            HealthState::Unknown => -1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HealthState::Healthy => "Healthy",
            HealthState::Warning => "Warning",
            HealthState::Error => "Error",
            HealthState::Unknown => "Unknown",
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(HealthState::Healthy),
            1 => Some(HealthState::Warning),
            2 => Some(HealthState::Error),
            -1 => Some(HealthState::Unknown),
            _ => None,
        }
    }

    /// Decodes a raw `lastValue` holding an integer health code.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<i32>().ok().and_then(Self::from_code)
    }
}

/// Boolean-to-label translation for selected metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricValueMapping {
    pub name: &'static str,
    pub enable: &'static str,
    pub disable: &'static str,
}

const VALUE_MAPPINGS: &[MetricValueMapping] = &[
    MetricValueMapping { name: "VideoBlackout", enable: "Blackout", disable: "Normal" },
    MetricValueMapping { name: "VideoFreeze", enable: "Freeze", disable: "Normal" },
    MetricValueMapping { name: "VideoMapping", enable: "Overlay active", disable: "Normal" },
    MetricValueMapping { name: "InputValidDisplayPort", enable: "Healthy", disable: "Invalid" },
    MetricValueMapping { name: "InputValidDVI1", enable: "Healthy", disable: "Invalid" },
    MetricValueMapping { name: "InputValidDVI2", enable: "Healthy", disable: "Invalid" },
    MetricValueMapping { name: "InputValidDVI3", enable: "Healthy", disable: "Invalid" },
    MetricValueMapping { name: "InputValidDVI4", enable: "Healthy", disable: "Invalid" },
    MetricValueMapping { name: "InputValidHDMI", enable: "Healthy", disable: "Invalid" },
    MetricValueMapping { name: "InputValidSDI", enable: "Healthy", disable: "Invalid" },
    MetricValueMapping { name: "InputValid", enable: "Healthy", disable: "Invalid" },
];

impl MetricValueMapping {
    /// Finds the mapping for a canonical metric display name.
    pub fn for_metric(name: &str) -> Option<&'static MetricValueMapping> {
        VALUE_MAPPINGS
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Maps literal `true`/`false`; anything else passes through.
    pub fn map<'a>(&self, value: &'a str) -> &'a str {
        match value {
            "true" => self.enable,
            "false" => self.disable,
            other => other,
        }
    }

    /// Applies the mapping registered for `name`, if any.
    pub fn apply(name: &str, value: &str) -> String {
        match Self::for_metric(name) {
            Some(mapping) => mapping.map(value).to_string(),
            None => value.to_string(),
        }
    }
}
