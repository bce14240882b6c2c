//! Configuration types for ScreenLink

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "screenlink";

/// Custom URL scheme registered for pairing callbacks
pub const DEFAULT_URL_SCHEME: &str = "screenlinkDesktop";

/// Remote service used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "https://screenlink.io";

/// Main configuration for ScreenLink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote service (no trailing slash required)
    pub base_url: String,
    /// URL scheme the OS uses to deliver pairing callbacks
    pub url_scheme: String,
    /// Directory holding session data such as the device code file
    pub data_dir: Option<PathBuf>,
    /// Upper bound for a single device code verification
    pub verify_timeout_secs: u64,
    /// Upper bound for upload link requests and transfers
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            url_scheme: DEFAULT_URL_SCHEME.to_string(),
            data_dir: None,
            verify_timeout_secs: 10,
            request_timeout_secs: 300,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    ///
    /// Fields missing from the file keep their default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the default configuration file, falling back to defaults if absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Default configuration file (~/.config/screenlink/config.json)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.json"))
    }

    /// Builder pattern: set the remote service base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builder pattern: set the callback URL scheme
    pub fn with_url_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.url_scheme = scheme.into();
        self
    }

    /// Builder pattern: set the session data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Builder pattern: set the verification timeout
    pub fn with_verify_timeout_secs(mut self, secs: u64) -> Self {
        self.verify_timeout_secs = secs;
        self
    }

    /// Builder pattern: set the upload request timeout
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.url_scheme.is_empty() || self.url_scheme.contains(':') {
            return Err(Error::Config(format!(
                "invalid url_scheme '{}'",
                self.url_scheme
            )));
        }
        if self.verify_timeout_secs == 0 {
            return Err(Error::Config("verify_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// Build an absolute URL for a path on the remote service
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base(), path.trim_start_matches('/'))
    }

    /// Resolve the session data directory
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(Error::NoDataDir)
    }

    /// Path of the persisted device code
    pub fn device_code_path(&self) -> Result<PathBuf> {
        Ok(self.resolve_data_dir()?.join("deviceCode.txt"))
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
