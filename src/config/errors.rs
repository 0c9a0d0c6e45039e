//! # Config Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ingest::RegistryError;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors. All of them stop startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid JSON or has unknown/mistyped keys
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Uploader or validator entry rejected
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A value is out of range
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "CONFIG_READ_FAILED",
            ConfigError::Parse(_) => "CONFIG_PARSE_FAILED",
            ConfigError::Registry(_) => "CONFIG_REGISTRY_INVALID",
            ConfigError::Invalid(_) => "CONFIG_VALUE_INVALID",
        }
    }
}
