//! Configuration loading traits and types.
//!
//! One TOML file configures the whole programmer. Every section has
//! defaults so a partial (or absent) file is usable.
//!
//! # Usage
//!
//! ```rust,no_run
//! use fprog_common::config::{ConfigLoader, ProgrammerConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ProgrammerConfig::load(Path::new("fprog.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{
    DEFAULT_DEVICE_SIZE, DEFAULT_SERVICE_NAME, DEFAULT_TICK_US, DEFAULT_VERIFY_EVERY_HK,
    MAX_DEVICE_SIZE,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Common configuration fields.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "fprog-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cooperative multi-tasking runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmtConfig {
    /// Keep running (dropping the message) when a must-deliver post finds
    /// the target queue full. Debugging aid only.
    pub no_qadd_panic: bool,

    /// Timer interrupt period [µs].
    pub tick_us: u32,

    /// Handler-registry self-check period, in housekeeping messages.
    pub verify_every_hk: u32,
}

impl Default for CmtConfig {
    fn default() -> Self {
        Self {
            no_qadd_panic: false,
            tick_us: DEFAULT_TICK_US,
            verify_every_hk: DEFAULT_VERIFY_EVERY_HK,
        }
    }
}

impl CmtConfig {
    /// Validate the runtime section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_us == 0 {
            return Err(ConfigError::ValidationError(
                "cmt.tick_us must be greater than 0".to_string(),
            ));
        }
        if self.verify_every_hk == 0 {
            return Err(ConfigError::ValidationError(
                "cmt.verify_every_hk must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Board and programmable-device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Board driver name (see the driver registry).
    pub driver: String,

    /// Settle delay between the steps of a multi-step board operation [µs].
    pub settle_us: u32,

    /// Simulated device size [bytes].
    pub device_size: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            driver: "simulation".to_string(),
            settle_us: 0,
            device_size: DEFAULT_DEVICE_SIZE,
        }
    }
}

impl BoardConfig {
    /// Validate the board section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.is_empty() {
            return Err(ConfigError::ValidationError(
                "board.driver cannot be empty".to_string(),
            ));
        }
        if !self.device_size.is_power_of_two() || self.device_size > MAX_DEVICE_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "board.device_size {} must be a power of two no larger than {MAX_DEVICE_SIZE}",
                self.device_size
            )));
        }
        Ok(())
    }
}

/// Complete programmer configuration (one file).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgrammerConfig {
    /// Shared section.
    #[serde(default)]
    pub shared: SharedConfig,

    /// CMT runtime section.
    #[serde(default)]
    pub cmt: CmtConfig,

    /// Board section.
    #[serde(default)]
    pub board: BoardConfig,
}

impl ProgrammerConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.cmt.validate()?;
        self.board.validate()
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    ///
    /// Parse and validation errors are still reported.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::FileNotFound) => {
                tracing::warn!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Any serde-deserializable struct can use ConfigLoader.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
