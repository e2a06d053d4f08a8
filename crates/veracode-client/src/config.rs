//! Client configuration.
//!
//! Configuration is driven by environment variables, using the names the
//! Veracode tooling uses for API credentials.

use std::fmt;
use std::time::Duration;

use reqwest::Url;

use crate::error::ClientError;

/// Default base URL of the Veracode XML APIs.
pub const DEFAULT_API_BASE: &str = "https://analysiscenter.veracode.com/api/5.0/";

/// Default transport timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Settings for a [`crate::VeracodeClient`].
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// API key id.
    pub api_key_id: String,
    /// Hex-encoded API key secret.
    #[serde(skip_serializing)]
    pub api_key_secret: String,
    /// Base URL endpoints are resolved against.
    pub api_base: String,
    /// Transport timeout in seconds. No retries are attempted.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key_id: String::new(),
            api_key_secret: String::new(),
            api_base: DEFAULT_API_BASE.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key_id", &self.api_key_id)
            .field("api_key_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with explicit credentials and default settings.
    #[must_use]
    pub fn new(api_key_id: impl Into<String>, api_key_secret: impl Into<String>) -> Self {
        Self {
            api_key_id: api_key_id.into(),
            api_key_secret: api_key_secret.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `VERACODE_API_KEY_ID` | *(empty)* |
    /// | `VERACODE_API_KEY_SECRET` | *(empty)* |
    /// | `VERACODE_API_BASE` | `https://analysiscenter.veracode.com/api/5.0/` |
    /// | `VERACODE_TIMEOUT_SECS` | `300` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("VERACODE_API_KEY_ID") {
            config.api_key_id = v;
        }
        if let Ok(v) = std::env::var("VERACODE_API_KEY_SECRET") {
            config.api_key_secret = v;
        }
        if let Ok(v) = std::env::var("VERACODE_API_BASE") {
            config.api_base = v;
        }
        if let Some(v) = std::env::var("VERACODE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.timeout_secs = v;
        }

        config
    }

    /// The transport timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parse and normalize the API base URL.
    ///
    /// The result always ends in `/`, so relative endpoints join under it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the URL is malformed or not http(s).
    pub fn api_base_url(&self) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| ClientError::Config(format!("invalid API base URL {:?}: {e}", self.api_base)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "API base URL must be http or https: {}",
                self.api_base
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}
