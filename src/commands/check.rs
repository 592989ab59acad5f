//! `check` subcommand: validates the configuration and optionally probes
//! the upstream host.

use anyhow::Result;
use nanosuite_aggregator::config::validate_config;
use nanosuite_aggregator::probe::ReachabilityProbe;
use nanosuite_aggregator::Config;

/// Validates configuration and upstream reachability.
///
/// Returns `Ok(false)` when any check failed.
pub fn command_check(ping: bool, config: &Config) -> Result<bool> {
    println!("🔍 NanoSuite Aggregator - System Check");
    println!("======================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_config(config, true) {
        Ok(()) => {
            println!("   ✅ Configuration is valid");
            if let Ok(base_url) = config.base_url() {
                println!("   ✅ Upstream: {}", base_url);
            }
            println!("   ✅ Fanout threads: {}", config.number_threads());
            let historical = config.historical_properties();
            if historical.is_empty() {
                println!("   ✅ No historical properties configured");
            } else {
                let mut names: Vec<_> = historical.into_iter().collect();
                names.sort();
                println!("   ✅ Historical properties: {}", names.join(", "));
            }
            if let Some(filter) = config.screen_name_filter() {
                println!("   ✅ Screen name filter: {}", filter);
            }
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    if ping && all_ok {
        println!("\n📡 Probing upstream host...");
        match ReachabilityProbe::from_config(config).ping() {
            Ok(latency) => println!("   ✅ Reachable, latency {} ms", latency),
            Err(e) => {
                println!("   ❌ Probe failed: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed");
    } else {
        println!("   ❌ Some checks failed - please review the output above");
    }
    Ok(all_ok)
}
