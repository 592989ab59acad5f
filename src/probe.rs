//! Reachability probe for the upstream host.
//!
//! TCP mode measures connect round-trips to the configured port and returns
//! the mean in milliseconds, floored to 1. ICMP mode runs the system `ping`
//! binary once per attempt, since raw ICMP sockets need elevated privileges.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::AggregatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingMode {
    Icmp,
    Tcp,
}

impl PingMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ICMP" => Some(PingMode::Icmp),
            "TCP" => Some(PingMode::Tcp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PingMode::Icmp => "ICMP",
            PingMode::Tcp => "TCP",
        }
    }
}

/// Probes host reachability according to the configured ping mode.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    mode: String,
    host: Option<String>,
    port: u16,
    attempts: u32,
    timeout: Duration,
}

impl ReachabilityProbe {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.ping_mode.clone().unwrap_or_else(|| "ICMP".into()),
            host: config.host.clone().filter(|h| !h.trim().is_empty()),
            port: config.port.unwrap_or(crate::config::DEFAULT_UPSTREAM_PORT),
            attempts: config.ping_attempts.unwrap_or(1).max(1),
            timeout: Duration::from_millis(config.ping_timeout_ms.unwrap_or(1000)),
        }
    }

    /// Round-trip latency in milliseconds.
    ///
    /// A connection that does not complete within the timeout reports the
    /// timeout itself, as the host framework expects.
    pub fn ping(&self) -> Result<u64, AggregatorError> {
        let mode = PingMode::parse(&self.mode)
            .ok_or_else(|| AggregatorError::UnknownPingMode(self.mode.clone()))?;
        let host = self.host.as_deref().ok_or(AggregatorError::NotInitialized)?;

        match mode {
            PingMode::Tcp => self.ping_tcp(host),
            PingMode::Icmp => self.ping_icmp(host),
        }
    }

    fn resolve(&self, host: &str) -> Result<SocketAddr, AggregatorError> {
        (host, self.port)
            .to_socket_addrs()
            .map_err(|e| AggregatorError::Probe(format!("Socket connection timed out: {e}")))?
            .next()
            .ok_or_else(|| AggregatorError::Probe(format!("No address found for {host}")))
    }

    fn ping_tcp(&self, host: &str) -> Result<u64, AggregatorError> {
        let addr = self.resolve(host)?;
        let mut total_ms: u64 = 0;

        for attempt in 1..=self.attempts {
            let start = Instant::now();
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    trace!(
                        "PING OK: Attempt #{} to connect to {} on port {} succeeded in {} ms",
                        attempt,
                        host,
                        self.port,
                        elapsed
                    );
                    total_ms += elapsed;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    return Err(AggregatorError::Probe("Socket connection timed out".into()));
                }
                Err(e) => {
                    warn!(
                        "PING TIMEOUT: Connection to {} did not succeed, UNKNOWN ERROR {}",
                        host, e
                    );
                    return Ok(self.timeout.as_millis() as u64);
                }
            }
        }

        Ok((total_ms / u64::from(self.attempts)).max(1))
    }

    fn ping_icmp(&self, host: &str) -> Result<u64, AggregatorError> {
        let timeout_secs = self.timeout.as_secs().max(1).to_string();
        let mut total_ms: u64 = 0;

        for attempt in 1..=self.attempts {
            let start = Instant::now();
            let status = Command::new("ping")
                .args(["-c", "1", "-W", &timeout_secs, host])
                .output()
                .map_err(|e| AggregatorError::Probe(format!("Failed to run ping: {e}")))?;

            if !status.status.success() {
                debug!(
                    "PING DISCONNECTED: {} did not answer attempt #{} within {}ms",
                    host,
                    attempt,
                    self.timeout.as_millis()
                );
                return Ok(self.timeout.as_millis() as u64);
            }

            let stdout = String::from_utf8_lossy(&status.stdout);
            let elapsed = parse_ping_time_ms(&stdout)
                .unwrap_or_else(|| start.elapsed().as_millis() as f64);
            total_ms += elapsed.round() as u64;
        }

        Ok((total_ms / u64::from(self.attempts)).max(1))
    }
}

/// Extracts `time=12.3 ms` from `ping` output.
fn parse_ping_time_ms(output: &str) -> Option<f64> {
    output
        .split_whitespace()
        .find_map(|token| token.strip_prefix("time="))
        .and_then(|value| value.trim_end_matches("ms").parse::<f64>().ok())
}
