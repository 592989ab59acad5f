//! Error types for the aggregator.
//!
//! `FetchError` is the failure classification of the upstream HTTP layer,
//! `AggregatorError` is what the facade surfaces to its host and
//! `ConfigError` covers loading and validating configuration files.

use thiserror::Error;

/// Failures reported by an [`AssetFetcher`](crate::client::AssetFetcher).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Upstream rejected the credentials (401/403).
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport or protocol failure: timeout, refused connection, non-success status.
    #[error("Command failed: {0}")]
    Command(String),

    /// The response body was not valid JSON.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Command(err.to_string())
        }
    }
}

/// Errors surfaced by the aggregator facade.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Fatal login error; the configured token was refused.
    #[error("Error when login to system. Please check the credentials: {0}")]
    Login(String),

    /// Aggregator info or the screen listing could not be retrieved.
    #[error("An error occurred when retrieving the {context}")]
    ResourceNotReachable {
        context: &'static str,
        #[source]
        source: FetchError,
    },

    /// The reachability probe could not reach the upstream host.
    #[error("Reachability probe failed: {0}")]
    Probe(String),

    /// Probe invoked with a ping mode other than ICMP or TCP.
    #[error("Unknown PING Mode: {0}")]
    UnknownPingMode(String),

    /// Operation requires a configured upstream host.
    #[error("Cannot use aggregator without a configured host")]
    NotInitialized,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_resource_not_reachable_keeps_source() {
        let err = AggregatorError::ResourceNotReachable {
            context: "system information",
            source: FetchError::Command("connection refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "An error occurred when retrieving the system information"
        );
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Command failed: connection refused"));
    }

    #[test]
    fn test_unknown_ping_mode_message() {
        let err = AggregatorError::UnknownPingMode("UDP".into());
        assert_eq!(err.to_string(), "Unknown PING Mode: UDP");
    }
}
