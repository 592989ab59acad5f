//! Configuration for the aggregator.
//!
//! Every field is optional so that a partial file merges cleanly over the
//! defaults. Files are YAML unless the extension says `.json` or `.toml`.

use ahash::AHashSet as HashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::probe::PingMode;

pub const DEFAULT_UPSTREAM_PORT: u16 = 443;
pub const DEFAULT_PROTOCOL: &str = "https";
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_NUMBER_THREADS: usize = 8;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_RETRIEVE_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 9216;

/// Default config file locations, first match wins.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/nanosuite/aggregator.yaml",
    "/etc/nanosuite/aggregator.yml",
    "/etc/nanosuite/aggregator.json",
    "./nanosuite-aggregator.yaml",
    "./nanosuite-aggregator.yml",
    "./nanosuite-aggregator.json",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    // Upstream
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
    /// Sent as `isaac-token` when non-empty.
    pub token: Option<String>,
    pub socket_timeout_ms: Option<u64>,

    // Reachability probe
    #[serde(alias = "pingMode")]
    pub ping_mode: Option<String>,
    pub ping_attempts: Option<u32>,
    pub ping_timeout_ms: Option<u64>,

    // Collection
    /// Kept as a string; see [`Config::number_threads`] for coercion.
    #[serde(alias = "numberThreads")]
    pub number_threads: Option<String>,
    /// Comma-separated metric names routed to the historical channel.
    #[serde(alias = "historicalProperties")]
    pub historical_properties: Option<String>,
    #[serde(alias = "screenNameFilter")]
    pub screen_name_filter: Option<String>,
    pub cycle_interval_secs: Option<u64>,
    pub retrieve_timeout_secs: Option<u64>,

    // HTTP surface
    pub listen_bind: Option<String>,
    pub listen_port: Option<u16>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: Some(DEFAULT_UPSTREAM_PORT),
            protocol: Some(DEFAULT_PROTOCOL.into()),
            token: None,
            socket_timeout_ms: Some(DEFAULT_SOCKET_TIMEOUT_MS),
            ping_mode: Some("ICMP".into()),
            ping_attempts: Some(1),
            ping_timeout_ms: Some(1000),
            number_threads: Some(DEFAULT_NUMBER_THREADS.to_string()),
            historical_properties: Some(String::new()),
            screen_name_filter: None,
            cycle_interval_secs: Some(DEFAULT_CYCLE_INTERVAL_SECS),
            retrieve_timeout_secs: Some(DEFAULT_RETRIEVE_TIMEOUT_SECS),
            listen_bind: Some(DEFAULT_BIND_ADDR.into()),
            listen_port: Some(DEFAULT_LISTEN_PORT),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    /// `protocol://host:port` of the upstream API.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::Invalid("host is not configured".into()))?;
        let protocol = self.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
        let port = self.port.unwrap_or(DEFAULT_UPSTREAM_PORT);
        Ok(format!("{}://{}:{}", protocol.to_ascii_lowercase(), host, port))
    }

    pub fn socket_timeout_ms(&self) -> u64 {
        self.socket_timeout_ms.unwrap_or(DEFAULT_SOCKET_TIMEOUT_MS)
    }

    /// Fanout pool size.
    ///
    /// Values in `[0, 8)` are accepted, anything else (negative, too large,
    /// non-numeric, missing) becomes 8. Zero means one thread per available
    /// core, still capped at 8.
    pub fn number_threads(&self) -> usize {
        let requested = self
            .number_threads
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| (0..DEFAULT_NUMBER_THREADS as i64).contains(n));

        match requested {
            Some(0) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(DEFAULT_NUMBER_THREADS),
            Some(n) => n as usize,
            None => DEFAULT_NUMBER_THREADS,
        }
    }

    /// Parsed historical property names; entries are trimmed, blanks dropped.
    pub fn historical_properties(&self) -> HashSet<String> {
        self.historical_properties
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn screen_name_filter(&self) -> Option<&str> {
        self.screen_name_filter
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(
            self.cycle_interval_secs
                .unwrap_or(DEFAULT_CYCLE_INTERVAL_SECS),
        )
    }

    pub fn retrieve_timeout(&self) -> Duration {
        Duration::from_secs(
            self.retrieve_timeout_secs
                .unwrap_or(DEFAULT_RETRIEVE_TIMEOUT_SECS),
        )
    }

    /// Parsed ping mode; an unknown value is an error.
    pub fn ping_mode(&self) -> Result<PingMode, ConfigError> {
        PingMode::parse(self.ping_mode.as_deref().unwrap_or("ICMP"))
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "Unknown PING Mode: {}",
                    self.ping_mode.as_deref().unwrap_or_default()
                ))
            })
    }
}

/// Validate effective config (used by --check-config and at startup).
pub fn validate_config(cfg: &Config, require_host: bool) -> Result<(), ConfigError> {
    if require_host {
        cfg.base_url()?;
    }

    if let Some(protocol) = cfg.protocol.as_deref() {
        if !protocol.eq_ignore_ascii_case("http") && !protocol.eq_ignore_ascii_case("https") {
            return Err(ConfigError::Invalid(format!(
                "Invalid protocol '{}', expected 'http' or 'https'",
                protocol
            )));
        }
    }

    cfg.ping_mode()?;

    if cfg.ping_attempts == Some(0) {
        return Err(ConfigError::Invalid("ping_attempts must be at least 1".into()));
    }

    if cfg.cycle_interval_secs == Some(0) {
        return Err(ConfigError::Invalid(
            "cycle_interval_secs must be greater than zero".into(),
        ));
    }

    Ok(())
}

/// Loads configuration from `path`, or from the first default location found.
///
/// Returns defaults when no file exists.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists()),
    };

    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, path.extension().and_then(|s| s.to_str()))?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text in the format implied by `extension` (YAML by default).
pub fn parse_config(content: &str, extension: Option<&str>) -> Result<Config, ConfigError> {
    match extension {
        Some("json") => serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
        Some("toml") => toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
    }
}
