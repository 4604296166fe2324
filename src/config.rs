// ABOUTME: Configuration loading and validation for the evlog binary.
// ABOUTME: Reads environment variables and turns them into driver options.

use std::path::PathBuf;

use evlog_store::DriverConfig;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("EVLOG_FILEPATH is set but empty")]
    EmptyPath,

    #[error("EVLOG_SYNC must be true or false, got {0:?}")]
    InvalidSync(String),
}

/// Binary configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvlogConfig {
    pub filepath: PathBuf,
    pub sync: bool,
}

impl EvlogConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - EVLOG_FILEPATH: log file (default: ./events.log)
    /// - EVLOG_SYNC: fsync each append (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let filepath = match lookup("EVLOG_FILEPATH") {
            Some(path) if path.trim().is_empty() => return Err(ConfigError::EmptyPath),
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("events.log"),
        };

        let sync = match lookup("EVLOG_SYNC").as_deref() {
            None => true,
            Some("true" | "1" | "yes") => true,
            Some("false" | "0" | "no") => false,
            Some(other) => return Err(ConfigError::InvalidSync(other.to_string())),
        };

        Ok(Self { filepath, sync })
    }

    /// Override the log path, e.g. from a command line flag.
    pub fn with_filepath(mut self, filepath: Option<PathBuf>) -> Self {
        if let Some(filepath) = filepath {
            self.filepath = filepath;
        }
        self
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            filepath: self.filepath.clone(),
            sync: self.sync,
        }
    }
}
