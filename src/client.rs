//! Upstream REST access.
//!
//! The core only depends on [`AssetFetcher`]; [`HttpFetcher`] is the
//! production implementation on top of a blocking `reqwest` client. The
//! blocking client must be built and used off the async runtime (see
//! `spawn_blocking` in the binary).

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::catalog::ProfileType;
use crate::config::Config;
use crate::error::{ConfigError, FetchError};

/// Header carrying the pre-configured API token.
pub const TOKEN_HEADER: &str = "isaac-token";

/// Aggregator facts.
pub const SETTINGS_PATH: &str = "api/v1/settings";

/// Asset listing endpoint, parameterised by profile and screen name.
pub const ASSETS_PATH: &str = "api/v1/infra/assets";

const PROFILE_TYPE_PARAM: &str = "profileType";
const SCREEN_NAME_PARAM: &str = "metadata[novastarScreenName]";

/// Marker whose presence in a serialized response means "no data".
const ERROR_MARKER: &str = "\"error\"";

/// Query parameters as `(name, value)` pairs.
pub type QueryParams = Vec<(&'static str, String)>;

/// Performs authenticated `GET`s against the upstream API.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, path: &str, params: &[(&'static str, String)]) -> Result<Value, FetchError>;
}

/// Parameters for the asset listing of one profile, optionally narrowed to a screen.
pub fn asset_query(profile: ProfileType, screen_name: Option<&str>) -> QueryParams {
    let mut params = vec![(PROFILE_TYPE_PARAM, profile.wire_token().to_string())];
    if let Some(name) = screen_name {
        params.push((SCREEN_NAME_PARAM, name.to_string()));
    }
    params
}

/// Unencoded `path?k=v&...` form, for logs and test fakes.
pub fn describe(path: &str, params: &[(&'static str, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}?{}", path, query.join("&"))
}

/// True when the response carries no usable data: `null` or an error payload.
pub fn is_error_payload(value: &Value) -> bool {
    if value.is_null() {
        return true;
    }
    value.to_string().contains(ERROR_MARKER)
}

/// Blocking HTTP implementation of [`AssetFetcher`].
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpFetcher {
    /// Builds a client from the upstream section of the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let base_url = config.base_url()?;
        let timeout = Duration::from_millis(config.socket_timeout_ms());
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl AssetFetcher for HttpFetcher {
    #[instrument(skip(self, params), fields(base = %self.base_url))]
    fn fetch(&self, path: &str, params: &[(&'static str, String)]) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("GET {}", describe(path, params));

        let mut request = self.client.get(&url).query(params);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send()?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth(format!("{} returned status {}", path, status)));
        }
        if !status.is_success() {
            return Err(FetchError::Command(format!(
                "{} returned status {}",
                path, status
            )));
        }

        let value: Value = response.json()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_asset_query_for_screen() {
        let params = asset_query(ProfileType::NovastarReceiver, Some("Main Hall"));
        assert_eq!(
            describe(ASSETS_PATH, &params),
            "api/v1/infra/assets?profileType=novastar_receiver&metadata[novastarScreenName]=Main Hall"
        );
    }

    #[test]
    fn test_unfiltered_screen_listing() {
        let params = asset_query(ProfileType::NovastarScreen, None);
        assert_eq!(
            describe(ASSETS_PATH, &params),
            "api/v1/infra/assets?profileType=novastar_screen"
        );
        assert_eq!(describe(SETTINGS_PATH, &[]), "api/v1/settings");
    }

    #[test]
    fn test_error_payload_detection() {
        assert!(is_error_payload(&json!({"error": "Unauthorized"})));
        assert!(is_error_payload(&json!({"status": "error"})));
        assert!(is_error_payload(&Value::Null));
        assert!(!is_error_payload(&json!([])));
        assert!(!is_error_payload(&json!([{"displayName": "Terror Dome"}])));
    }

    #[test]
    fn test_http_fetcher_requires_host() {
        let config = Config::default();
        assert!(HttpFetcher::from_config(&config).is_err());
    }

    #[test]
    fn test_http_fetcher_base_url() {
        let config = Config {
            host: Some("isaac.example".into()),
            port: Some(8443),
            ..Config::default()
        };
        let fetcher = HttpFetcher::from_config(&config).unwrap();
        assert_eq!(fetcher.base_url(), "https://isaac.example:8443");
    }
}
