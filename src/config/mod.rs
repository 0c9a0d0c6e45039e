//! Configuration
//!
//! One JSON file, loaded and validated eagerly at startup:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/ingestd",
//!   "http": { "host": "0.0.0.0", "port": 9888, "max_body_bytes": 67108864 },
//!   "uploaders": {
//!     "acme": { "psk": "s3cret", "columns_order": ["UUID", "amount"] }
//!   },
//!   "validators": { "amount": "[0-9]+" }
//! }
//! ```
//!
//! Unknown keys are rejected. `http` and `validators` are optional.

mod errors;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use errors::{ConfigError, ConfigResult};

use crate::context::AppContext;
use crate::http_server::HttpServerConfig;
use crate::ingest::{UploaderConfig, UploaderRegistry, ValidatorRegistry};
use crate::storage::DocumentStore;

/// One `uploaders` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploaderEntry {
    /// Pre-shared key
    pub psk: String,

    /// Column names in row order
    pub columns_order: Vec<String>,
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Data directory (required)
    pub data_dir: PathBuf,

    /// HTTP listener (optional, defaults apply per field)
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Uploader identity -> secret and columns
    pub uploaders: BTreeMap<String, UploaderEntry>,

    /// Field name -> pattern the whole value must match
    #[serde(default)]
    pub validators: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: AppConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("http.max_body_bytes must be > 0".into()));
        }

        self.uploader_registry()?;
        self.validator_registry()?;

        let declared: HashSet<&str> = self
            .uploaders
            .values()
            .flat_map(|u| u.columns_order.iter().map(String::as_str))
            .collect();
        for field in self.validators.keys() {
            if !declared.contains(field.as_str()) {
                tracing::warn!(field = %field, "validator does not match any declared column");
            }
        }

        Ok(())
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }

    /// Build the uploader registry
    pub fn uploader_registry(&self) -> ConfigResult<UploaderRegistry> {
        let mut registry = UploaderRegistry::new();
        for (identity, entry) in &self.uploaders {
            let uploader =
                UploaderConfig::new(identity.as_str(), entry.psk.as_str(), entry.columns_order.clone())?;
            registry.register(uploader)?;
        }
        Ok(registry)
    }

    /// Compile the validator registry
    pub fn validator_registry(&self) -> ConfigResult<ValidatorRegistry> {
        Ok(ValidatorRegistry::from_patterns(
            self.validators.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )?)
    }

    /// Build the request context around `store`
    pub fn build_context(&self, store: Arc<dyn DocumentStore>) -> ConfigResult<AppContext> {
        Ok(AppContext::new(
            self.uploader_registry()?,
            self.validator_registry()?,
            store,
        ))
    }
}
