//! nanosuite-aggregator
//!
//! HTTP service that polls a NanoSuite (ISAAC) upstream for NovaStar
//! screens, senders and receivers and serves normalized statistics.
//!
//! Startup builds the upstream client and the aggregator facade, then
//! serves `/statistics`, `/devices`, `/ping`, `/metrics`, `/health` and
//! `/doc`. On SIGINT/SIGTERM the facade is destroyed, which stops the
//! collector thread and clears cached state.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use clap::{Parser, ValueEnum};
use nanosuite_aggregator::client::HttpFetcher;
use nanosuite_aggregator::config::{
    load_config, validate_config, DEFAULT_BIND_ADDR, DEFAULT_LISTEN_PORT,
};
use nanosuite_aggregator::metrics::AggregatorMetrics;
use nanosuite_aggregator::{Aggregator, Config};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

mod cli;
mod commands;
mod handlers;
mod state;

use cli::{Args, Commands, ConfigFormat, LogLevel};
use commands::{command_check, command_collect, command_config};
use handlers::{
    devices_handler, doc_handler, health_handler, metrics_handler, ping_handler,
    statistics_handler,
};
use state::{AppState, SharedState};

/// -------------------------------------------------------------------
/// CONFIGURATION MANAGEMENT
/// -------------------------------------------------------------------

/// Resolves configuration from CLI args, config file, and defaults.
/// Precedence: CLI (if provided) > config file > default.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref()).context("Failed to load configuration")?
    };

    if let Some(bind_ip) = args.bind {
        config.listen_bind = Some(bind_ip.to_string());
    }
    if let Some(port) = args.port {
        config.listen_port = Some(port);
    }
    if let Some(level) = &args.log_level {
        if let Some(value) = level.to_possible_value() {
            config.log_level = Some(value.get_name().to_string());
        }
    }

    // Upstream overrides
    if args.host.is_some() {
        config.host = args.host.clone();
    }
    if args.token.is_some() {
        config.token = args.token.clone();
    }
    if args.number_threads.is_some() {
        config.number_threads = args.number_threads.clone();
    }
    if args.historical_properties.is_some() {
        config.historical_properties = args.historical_properties.clone();
    }
    if args.screen_name_filter.is_some() {
        config.screen_name_filter = args.screen_name_filter.clone();
    }
    if args.ping_mode.is_some() {
        config.ping_mode = args.ping_mode.clone();
    }

    Ok(config)
}

/// Shows configuration in requested format, with the token masked.
fn show_config(config: &Config, format: ConfigFormat) -> Result<()> {
    let mut config = config.clone();
    if config.token.as_deref().is_some_and(|t| !t.is_empty()) {
        config.token = Some("********".into());
    }

    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
    };
    println!("{output}");
    Ok(())
}

/// Effective log level: CLI flag, then config file, then info.
fn effective_log_level(config: &Config) -> LogLevel {
    config
        .log_level
        .as_deref()
        .and_then(|raw| LogLevel::from_str(raw, true).ok())
        .unwrap_or(LogLevel::Info)
}

/// Initializes tracing logging subsystem with configured log level
fn setup_logging(level: &LogLevel) {
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return;
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_config(&config, true) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Handle subcommands
    if let Some(command) = args.command.take() {
        let config = resolve_config(&args)?;
        setup_logging(&effective_log_level(&config));

        // The upstream client is blocking; keep it off the runtime threads.
        let ok = tokio::task::spawn_blocking(move || -> Result<bool> {
            match command {
                Commands::Check { ping } => command_check(ping, &config),
                Commands::Config {
                    output,
                    format,
                    commented,
                } => command_config(output, format, commented).map(|()| true),
                Commands::Collect { verbose, format } => {
                    validate_config(&config, true)?;
                    command_collect(verbose, format, &config).map(|()| true)
                }
            }
        })
        .await
        .context("Command task failed")??;

        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Load configuration for main server mode
    let config = resolve_config(&args)?;

    // Validate config before starting the service
    if let Err(e) = validate_config(&config, true) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&effective_log_level(&config));
    info!("Starting nanosuite-aggregator");

    let bind_ip_str = config
        .listen_bind
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.listen_port.unwrap_or(DEFAULT_LISTEN_PORT);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = AggregatorMetrics::new(&registry)?;
    debug!("All metrics registered successfully");

    // init: build the blocking upstream client and the facade off the runtime
    let facade_config = config.clone();
    let aggregator = tokio::task::spawn_blocking(move || -> Result<Aggregator> {
        let fetcher = HttpFetcher::from_config(&facade_config)?;
        info!("Upstream API: {}", fetcher.base_url());
        Ok(Aggregator::new(facade_config, Arc::new(fetcher), metrics))
    })
    .await
    .context("Aggregator init task failed")??;

    let state: SharedState = Arc::new(AppState::new(registry, Arc::new(aggregator), config));

    // Configure HTTP server routes and start listening
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;
    let app = Router::new()
        .route("/statistics", get(statistics_handler))
        .route("/devices", get(devices_handler))
        .route("/ping", get(ping_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/doc", get(doc_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!(
        "nanosuite-aggregator listening on http://{}:{}",
        bind_ip_str, port
    );

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
        }
    }

    // destroy: stop the collector and release the blocking client off the runtime
    let teardown = tokio::task::spawn_blocking(move || {
        state.aggregator.destroy();
        drop(state);
    });
    if let Err(e) = teardown.await {
        error!("Aggregator teardown failed: {}", e);
    }

    info!("nanosuite-aggregator stopped gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"host: from-file\nlisten_port: 9000\nnumber_threads: \"2\"\n",
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let args = Args::try_parse_from([
            "nanosuite-aggregator",
            "--config",
            path.as_str(),
            "--host",
            "from-cli",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let config = resolve_config(&args).unwrap();
        assert_eq!(config.host.as_deref(), Some("from-cli"));
        assert_eq!(config.listen_port, Some(9000));
        assert_eq!(config.number_threads(), 2);
        assert_eq!(effective_log_level(&config), LogLevel::Debug);
    }

    #[test]
    fn test_no_config_uses_defaults() {
        let args = Args::try_parse_from(["nanosuite-aggregator", "--no-config"]).unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(effective_log_level(&config), LogLevel::Info);
    }
}
