//! YAML configuration for the autofill service.
//!
//! Every section is optional; missing fields take their defaults. Retry and
//! timeout settings left unset fall back to the device profile's
//! recommendations.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "pixel-8"
//!
//! matcher:
//!   strategy: BASE_DOMAIN
//!   additional_browsers:
//!     - "net.example.surf"
//!
//! builder:
//!   capacity: 5
//!   use_picker: false
//!
//! retry:
//!   retry_count: 2
//!   base_delay_ms: 100
//!
//! timeout_ms: 4000
//!
//! metrics:
//!   series_capacity: 1000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use fill::DeviceProfile;
use matcher::MatcherConfig;
use resilience::{AutofillError, RetryConfig};
use serde::{Deserialize, Serialize};
use telemetry::DEFAULT_SERIES_CAPACITY;
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

impl From<ConfigLoadError> for AutofillError {
    fn from(err: ConfigLoadError) -> Self {
        AutofillError::configuration(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutofillConfig {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub matcher: MatcherConfig,

    #[serde(default)]
    pub builder: BuilderYamlConfig,

    /// Unset means the device's recommended retry count.
    #[serde(default)]
    pub retry: Option<RetryConfig>,

    /// Unset means the device's recommended timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub metrics: MetricsYamlConfig,
}

impl AutofillConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML configuration from a string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: AutofillConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.matcher
            .validate()
            .map_err(|err| ConfigLoadError::Validation(err.to_string()))?;

        if self.timeout_ms == Some(0) {
            return Err(ConfigLoadError::Validation(
                "timeout_ms must be > 0".to_string(),
            ));
        }
        if self.metrics.series_capacity == 0 {
            return Err(ConfigLoadError::Validation(
                "metrics.series_capacity must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry settings, preferring the configured ones over the device's.
    pub fn effective_retry(&self, device: &DeviceProfile) -> RetryConfig {
        self.retry.unwrap_or_else(|| {
            RetryConfig::default().with_retry_count(device.recommended_retry_count())
        })
    }

    /// Per-request deadline, preferring the configured one over the device's.
    pub fn effective_timeout(&self, device: &DeviceProfile) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| device.recommended_timeout())
    }
}

impl Default for AutofillConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: None,
            matcher: MatcherConfig::default(),
            builder: BuilderYamlConfig::default(),
            retry: None,
            timeout_ms: None,
            metrics: MetricsYamlConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderYamlConfig {
    /// Maximum fill units per response; 0 means no limit.
    #[serde(default)]
    pub capacity: usize,

    /// Hand multi-candidate requests to the picker when one is installed.
    #[serde(default)]
    pub use_picker: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsYamlConfig {
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,
}

impl Default for MetricsYamlConfig {
    fn default() -> Self {
        Self {
            series_capacity: DEFAULT_SERIES_CAPACITY,
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_series_capacity() -> usize {
    DEFAULT_SERIES_CAPACITY
}
