//! `config` subcommand: writes a default configuration file.

use anyhow::{Context, Result};
use nanosuite_aggregator::Config;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

const DEFAULT_OUTPUT: &str = "nanosuite-aggregator.yaml";

/// Generates configuration files
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> Result<()> {
    let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let content = render_default_config(format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

fn render_default_config(format: ConfigFormat, commented: bool) -> Result<String> {
    let config = Config::default();
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => {
            let content = serde_yaml::to_string(&config)?;
            if commented {
                add_config_comments(content)
            } else {
                content
            }
        }
    };
    Ok(content)
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# NanoSuite Aggregator Configuration
# ==================================
#
# Upstream API
# ------------
# host: null                   # NanoSuite (ISAAC) host name or IP
# port: 443                    # Upstream port
# protocol: "https"            # http or https
# token: null                  # API token, sent as the isaac-token header
# socket_timeout_ms: 10000     # Per-request timeout
#
# Reachability Probe
# ------------------
# ping_mode: "ICMP"            # ICMP or TCP
# ping_attempts: 1             # TCP connect attempts averaged per probe
# ping_timeout_ms: 1000        # Probe timeout
#
# Collection
# ----------
# number_threads: "8"          # Fanout pool size, 0 = auto, values >= 8 become 8
# historical_properties: ""    # Receiver metrics routed to dynamicStatistics
# screen_name_filter: null     # Only list screens matching this name
# cycle_interval_secs: 30      # Pause between fanout cycles
# retrieve_timeout_secs: 180   # Pause collection after this long without /devices
#
# HTTP Surface
# ------------
# listen_bind: "0.0.0.0"       # Bind IP (0.0.0.0 = all interfaces)
# listen_port: 9216            # HTTP port
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanosuite_aggregator::config::parse_config;

    #[test]
    fn test_generated_configs_parse_back() {
        for (format, ext) in [
            (ConfigFormat::Yaml, "yaml"),
            (ConfigFormat::Json, "json"),
            (ConfigFormat::Toml, "toml"),
        ] {
            let content = render_default_config(format, true).unwrap();
            let parsed = parse_config(&content, Some(ext)).unwrap();
            assert_eq!(parsed.port, Config::default().port);
            assert_eq!(parsed.number_threads(), 8);
        }
    }

    #[test]
    fn test_write_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregator.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# NanoSuite Aggregator Configuration"));
    }
}
