//! Client configuration

use std::env;

use hyper::Uri;

use crate::error::{Error, Result};

/// Store host used when no endpoint is configured
pub const DEFAULT_ENDPOINT: &str = "https://kv.kevinc.ltd";

/// Per-call timeout used when none is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Configuration options for the store client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the store, without the `/data/manageData` path
    pub endpoint: String,
    /// Application id, sent as `X-AppId`
    pub app_id: String,
    /// Application key, sent as `X-AppKey`
    pub app_key: String,
    /// User the stored values belong to
    pub user_name: String,
    /// Request timeout in milliseconds (default: 10000)
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id: String::new(),
            app_key: String::new(),
            user_name: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    /// Config for the default endpoint with the given credentials
    pub fn new(app_id: &str, app_key: &str, user_name: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            app_key: app_key.to_string(),
            user_name: user_name.to_string(),
            ..Default::default()
        }
    }

    /// Load configuration from `KV_APP_ID`, `KV_APP_KEY`, `KV_USER`, and optionally
    /// `KV_ENDPOINT` and `KV_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        let app_id = require_env("KV_APP_ID")?;
        let app_key = require_env("KV_APP_KEY")?;
        let user_name = require_env("KV_USER")?;
        let endpoint = env::var("KV_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let timeout_ms = env::var("KV_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let config = ClientConfig {
            endpoint,
            app_id,
            app_key,
            user_name,
            timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be used to build a client
    pub fn validate(&self) -> Result<()> {
        if self.app_id.is_empty() {
            return Err(Error::InvalidConfig("app_id must not be empty".to_string()));
        }
        if self.app_key.is_empty() {
            return Err(Error::InvalidConfig("app_key must not be empty".to_string()));
        }
        if self.user_name.is_empty() {
            return Err(Error::InvalidConfig("user_name must not be empty".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout_ms must be greater than zero".to_string()));
        }

        let uri: Uri = self.endpoint.parse()
            .map_err(|e| Error::InvalidUrl(format!("Invalid endpoint URL: {}", e)))?;
        match uri.scheme_str() {
            Some("http") | Some("https") => Ok(()),
            _ => Err(Error::InvalidUrl(format!(
                "Endpoint must use http:// or https://: {}",
                self.endpoint
            ))),
        }
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name)
        .map_err(|_| Error::InvalidConfig(format!("{} environment variable must be set", name)))
}
