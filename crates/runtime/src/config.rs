//! Configuration for the run-control core
//!
//! Settings come from defaults, an optional TOML file and `CADENCE_*`
//! environment variables, in that order of precedence (lowest first).

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("IO error reading config file: {message}")]
    IoError { message: String },

    #[error("Configuration parsing error: {message}")]
    ParseError { message: String },
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControlConfig {
    /// Diagnostic poller budget
    pub poller: PollerConfig,
    /// Schedule driver tick loop
    pub driver: DriverConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Retry budget for [`TaskControl::poll_for_number_created_with`](crate::scheduler::TaskControl::poll_for_number_created_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub attempts: u32,
    /// Sleep before every attempt, the first one included.
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            attempts: 50,
            delay: Duration::from_millis(2),
        }
    }
}

/// Settings for [`ScheduleDriver`](crate::scheduler::ScheduleDriver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Longest the loop sleeps before rescanning tasks, and the retry delay after a failed creation.
    #[serde(with = "humantime_serde")]
    pub idle_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `cadence_runtime=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                reason: format!("unknown format {other:?}"),
            }),
        }
    }
}

impl ControlConfig {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `CADENCE_LOG_LEVEL`, `CADENCE_LOG_FORMAT` and `CADENCE_POLL_ATTEMPTS`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(level) = env::var("CADENCE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("CADENCE_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }

        if let Ok(attempts) = env::var("CADENCE_POLL_ATTEMPTS") {
            self.poller.attempts = attempts.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CADENCE_POLL_ATTEMPTS".to_string(),
                reason: "Invalid attempt count".to_string(),
            })?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poller.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poller.attempts".to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }

        if self.driver.idle_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "driver.idle_interval".to_string(),
                reason: "Idle interval cannot be zero".to_string(),
            });
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                reason: "Level cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}
