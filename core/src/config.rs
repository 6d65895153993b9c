//! Client configuration.
//!
//! # Design
//! `ClientConfig` is plain data. It is validated once when a client is built
//! and never mutated afterwards. `from_env` is a thin wrapper over
//! `from_lookup` so the parsing rules can be tested without touching the
//! process environment.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "https://api.intercom.io/v1/";

/// Time allowed to establish the TCP/TLS connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for the whole call, body included.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(60);

pub const ENV_APP_ID: &str = "INTERCOM_APP_ID";
pub const ENV_API_KEY: &str = "INTERCOM_API_KEY";
pub const ENV_ENDPOINT: &str = "INTERCOM_ENDPOINT";
pub const ENV_DEBUG: &str = "INTERCOM_DEBUG";

/// Credentials and endpoint for one client instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub app_id: String,
    pub api_key: String,
    /// Emit request/response traces on the `intercom_core::wire` target.
    pub debug: bool,
}

impl ClientConfig {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id: app_id.into(),
            api_key: api_key.into(),
            debug: false,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Read `INTERCOM_APP_ID`, `INTERCOM_API_KEY`, and the optional
    /// `INTERCOM_ENDPOINT` / `INTERCOM_DEBUG` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = lookup(ENV_APP_ID).ok_or(ConfigError::MissingVar(ENV_APP_ID))?;
        let api_key = lookup(ENV_API_KEY).ok_or(ConfigError::MissingVar(ENV_API_KEY))?;

        let mut config = Self::new(app_id, api_key);
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|e| !e.trim().is_empty()) {
            config.endpoint = endpoint;
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            config.debug = parse_flag(&flag);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that the endpoint is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };
        let url = Url::parse(&self.endpoint).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(invalid(format!("unsupported scheme {other}"))),
        }
    }

    /// Endpoint without its trailing slash, ready to have paths appended.
    pub(crate) fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("app_id", &self.app_id)
            .field("api_key", &"<redacted>")
            .field("debug", &self.debug)
            .finish()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn new_uses_default_endpoint() {
        let config = ClientConfig::new("app", "key");
        assert_eq!(config.endpoint, "https://api.intercom.io/v1/");
        assert!(!config.debug);
        assert_eq!(config.base_url(), "https://api.intercom.io/v1");
    }

    #[test]
    fn from_lookup_requires_credentials() {
        let err = ClientConfig::from_lookup(lookup(&[("INTERCOM_APP_ID", "app")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("INTERCOM_API_KEY"));

        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("INTERCOM_APP_ID"));
    }

    #[test]
    fn from_lookup_reads_optional_values() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("INTERCOM_APP_ID", "app"),
            ("INTERCOM_API_KEY", "key"),
            ("INTERCOM_ENDPOINT", "http://127.0.0.1:3000/v1/"),
            ("INTERCOM_DEBUG", "True"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:3000/v1/");
        assert!(config.debug);
    }

    #[test]
    fn debug_flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" on "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }

    #[test]
    fn validate_rejects_bad_endpoints() {
        let config = ClientConfig::new("app", "key").with_endpoint("not a url");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        let config = ClientConfig::new("app", "key").with_endpoint("ftp://example.com/v1/");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = ClientConfig::new("app", "super-secret");
        let printed = format!("{config:?}");
        assert!(printed.contains("app"));
        assert!(!printed.contains("super-secret"));
    }
}
