//! Configuration management for the integration dashboard client

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Sync job configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the dashboard backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Sync job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How long a simulated sync job stays pending
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,

    /// Delay between job status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting for a job after this long
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_simulated_delay_ms() -> u64 {
    1000
}

const fn default_poll_interval_ms() -> u64 {
    100
}

const fn default_max_wait_ms() -> u64 {
    60_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            simulated_delay_ms: default_simulated_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl BackendConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SyncConfig {
    /// Simulated job duration
    #[must_use]
    pub const fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Maximum wait for a job
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Config {
    /// Load configuration from an optional `integrator.*` file in the working
    /// directory and `INTEGRATOR__*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of the default file when given
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be read, or the merged configuration
    /// cannot be parsed.
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        let file = path.map_or_else(
            || config::File::with_name("integrator").required(false),
            |p| config::File::from(p).required(true),
        );

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("INTEGRATOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        tracing::debug!(base_url = %config.backend.base_url, "configuration loaded");
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] describing the first problem found.
    pub fn validate(&self) -> crate::Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(crate::Error::configuration("backend.base_url must not be empty"));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(crate::Error::configuration(
                "backend.request_timeout_secs must be greater than zero",
            ));
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(crate::Error::configuration(
                "sync.poll_interval_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}
