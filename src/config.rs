//! # Upload Configuration
//!
//! Settings for the background session and the event bridge. Values come from
//! three layers, later layers overriding earlier ones:
//!
//! 1. [`UploadConfig::default`]
//! 2. An optional TOML/YAML/JSON file
//! 3. `BGUPLOAD_*` environment variables
//!
//! ```rust,no_run
//! use background_upload::config::UploadConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = UploadConfig::load(Some("config/upload.toml".as_ref()))?;
//! println!("session prefix: {}", config.session_identifier_prefix);
//! # Ok(())
//! # }
//! ```

use crate::constants::{bridge, session};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for every override
pub const ENV_PREFIX: &str = "BGUPLOAD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid environment variable {variable}: {reason}")]
    InvalidEnvironment { variable: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Prefix of every background session identifier, `<prefix>.<namespace>`
    pub session_identifier_prefix: String,
    pub allows_cellular_access: bool,
    /// Let the OS defer transfers to a convenient time (power, network)
    pub discretionary: bool,
    /// Relaunch the app when the session has events to deliver
    pub sends_launch_events: bool,
    pub request_timeout_seconds: u64,
    pub resource_timeout_seconds: u64,
    /// Capacity of the bridge's broadcast channel
    pub event_channel_capacity: usize,
    /// Directory for the persisted latest-event store; `None` keeps events in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_store_directory: Option<PathBuf>,
    pub error_status_threshold: u16,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            session_identifier_prefix: session::DEFAULT_IDENTIFIER_PREFIX.to_string(),
            allows_cellular_access: true,
            discretionary: false,
            sends_launch_events: true,
            request_timeout_seconds: session::DEFAULT_REQUEST_TIMEOUT_SECONDS,
            resource_timeout_seconds: session::DEFAULT_RESOURCE_TIMEOUT_SECONDS,
            event_channel_capacity: bridge::DEFAULT_EVENT_CHANNEL_CAPACITY,
            event_store_directory: None,
            error_status_threshold: bridge::DEFAULT_ERROR_STATUS_THRESHOLD,
        }
    }
}

impl UploadConfig {
    /// Defaults overridden by `BGUPLOAD_*` environment variables only
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Ok(prefix) = std::env::var("BGUPLOAD_SESSION_IDENTIFIER_PREFIX") {
            config.session_identifier_prefix = prefix;
        }

        if let Ok(cellular) = std::env::var("BGUPLOAD_ALLOWS_CELLULAR_ACCESS") {
            config.allows_cellular_access =
                parse_env("BGUPLOAD_ALLOWS_CELLULAR_ACCESS", &cellular)?;
        }

        if let Ok(timeout) = std::env::var("BGUPLOAD_REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout_seconds =
                parse_env("BGUPLOAD_REQUEST_TIMEOUT_SECONDS", &timeout)?;
        }

        if let Ok(capacity) = std::env::var("BGUPLOAD_EVENT_CHANNEL_CAPACITY") {
            config.event_channel_capacity =
                parse_env("BGUPLOAD_EVENT_CHANNEL_CAPACITY", &capacity)?;
        }

        if let Ok(dir) = std::env::var("BGUPLOAD_EVENT_STORE_DIRECTORY") {
            config.event_store_directory = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Layered load: defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading upload configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: UploadConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.session_identifier_prefix.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "session_identifier_prefix".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "request_timeout_seconds".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.resource_timeout_seconds < self.request_timeout_seconds {
            return Err(ConfigurationError::InvalidValue {
                field: "resource_timeout_seconds".to_string(),
                reason: "must not be shorter than request_timeout_seconds".to_string(),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "event_channel_capacity".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(100..=599).contains(&self.error_status_threshold) {
            return Err(ConfigurationError::InvalidValue {
                field: "error_status_threshold".to_string(),
                reason: format!("{} is not an HTTP status", self.error_status_threshold),
            });
        }
        Ok(())
    }

    /// Session identifier for a namespace, stable across relaunches
    pub fn session_identifier(&self, namespace: &str) -> String {
        format!("{}.{}", self.session_identifier_prefix, namespace)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_secs(self.resource_timeout_seconds)
    }

    /// Full path of the persisted event store, if persistence is enabled
    pub fn event_store_path(&self) -> Option<PathBuf> {
        self.event_store_directory
            .as_ref()
            .map(|dir| dir.join(bridge::EVENT_STORE_FILE))
    }
}

fn parse_env<T>(variable: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigurationError::InvalidEnvironment {
            variable: variable.to_string(),
            reason: e.to_string(),
        })
}
