//! CLI arguments and subcommands for nanosuite-aggregator.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "nanosuite-aggregator",
    about = "Polling aggregator for NovaStar LED screens managed by NanoSuite",
    long_about = "Polling aggregator for NovaStar LED screens managed by NanoSuite.\n\n\
                  Periodically queries the NanoSuite (ISAAC) REST API for screens, senders \
                  and receivers, normalizes their metrics into flat property maps and serves \
                  aggregator facts and device snapshots over HTTP.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides log_level from the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Upstream NanoSuite host
    #[arg(long)]
    pub host: Option<String>,

    /// API token sent as isaac-token
    #[arg(long)]
    pub token: Option<String>,

    /// Fanout pool size (0 = auto, 8 max)
    #[arg(long)]
    pub number_threads: Option<String>,

    /// Receiver metrics routed to the historical channel (comma-separated)
    #[arg(long)]
    pub historical_properties: Option<String>,

    /// Only list screens whose name matches this value
    #[arg(long)]
    pub screen_name_filter: Option<String>,

    /// Reachability probe mode (ICMP or TCP)
    #[arg(long)]
    pub ping_mode: Option<String>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and upstream reachability
    Check {
        /// Run the reachability probe against the upstream host
        #[arg(long)]
        ping: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run one collection pass and print the result
    Collect {
        /// Show every device property
        #[arg(long)]
        verbose: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },
}
