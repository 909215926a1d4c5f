//! Configuration file support for bookfind.
//!
//! # Configuration File Format
//!
//! ```toml
//! [catalog]
//! base_url = "https://www.arbookfind.co.uk/"
//! user_type = "radParent"
//! timeout_secs = 30
//! fetch_details = true
//!
//! [lookup]
//! base_url = "https://openlibrary.org/"
//! language = "eng"
//!
//! [aggregator]
//! max_concurrent_probes = 4
//! quote_queries = true
//!
//! [rerank]
//! enabled = true
//! model = "gpt-4o-mini"
//! temperature = 0.1
//!
//! [logging]
//! level = "info"
//! ```
//!
//! The reranker API key is best left to `OPENAI_API_KEY` or
//! `BOOKFIND_RERANK__API_KEY` rather than written to disk.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{AggregatorConfig, CatalogConfig, Config, LookupConfig, RerankConfig};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub rerank: RerankConfig,

    /// Logging section
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when neither `-v`/`-q` nor `RUST_LOG` is given
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file, leaving the API key out
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let mut redacted = self.clone();
        redacted.rerank.api_key = None;

        let content = toml::to_string_pretty(&redacted)
            .map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }

    /// Runtime settings held by this file
    pub fn into_config(self) -> Config {
        Config {
            catalog: self.catalog,
            lookup: self.lookup,
            aggregator: self.aggregator,
            rerank: self.rerank,
        }
    }
}

impl From<Config> for ConfigFile {
    fn from(config: Config) -> Self {
        Self {
            catalog: config.catalog,
            lookup: config.lookup,
            aggregator: config.aggregator,
            rerank: config.rerank,
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
