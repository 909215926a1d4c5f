//! Configuration management.

mod file_config;

pub use file_config::{ConfigFile, ConfigFileError, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{HttpSettings, DEFAULT_USER_AGENT};

/// Environment variable prefix for overrides, e.g. `BOOKFIND_CATALOG__TIMEOUT_SECS`
pub const ENV_PREFIX: &str = "BOOKFIND";

/// File name searched for by [`find_config_file`]
pub const CONFIG_FILE_NAME: &str = "bookfind.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog site settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Bibliographic service settings
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Fan-out settings
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Optional candidate reranking
    #[serde(default)]
    pub rerank: RerankConfig,
}

/// Catalog site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding `default.aspx` and `advanced.aspx`
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// Radio value submitted during the handshake
    #[serde(default = "default_user_type")]
    pub user_type: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Fetch each book's detail page (series, word count, year, ISBN)
    #[serde(default = "default_true")]
    pub fetch_details: bool,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            user_type: default_user_type(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            fetch_details: true,
            user_agent: None,
        }
    }
}

impl CatalogConfig {
    pub fn http_settings(&self) -> HttpSettings {
        http_settings(
            self.user_agent.as_deref(),
            self.timeout_secs,
            self.connect_timeout_secs,
        )
    }
}

/// Bibliographic service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_url")]
    pub base_url: String,

    /// Language filter for text searches
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: default_lookup_url(),
            language: default_language(),
            timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

impl LookupConfig {
    pub fn http_settings(&self) -> HttpSettings {
        http_settings(None, self.timeout_secs, default_connect_timeout_secs())
    }
}

/// Fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Upper bound on candidate probes in flight
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Wrap free-text queries in double quotes before the lookup
    #[serde(default = "default_true")]
    pub quote_queries: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: default_max_concurrent_probes(),
            quote_queries: true,
        }
    }
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_rerank_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// Falls back to `OPENAI_API_KEY`
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_rerank_endpoint(),
            model: default_rerank_model(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RerankConfig {
    pub fn http_settings(&self) -> HttpSettings {
        http_settings(None, self.timeout_secs, default_connect_timeout_secs())
    }
}

fn http_settings(user_agent: Option<&str>, timeout_secs: u64, connect_secs: u64) -> HttpSettings {
    HttpSettings {
        user_agent: user_agent.unwrap_or(DEFAULT_USER_AGENT).to_string(),
        timeout: Duration::from_secs(timeout_secs),
        connect_timeout: Duration::from_secs(connect_secs),
        cookie_store: false,
    }
}

fn default_catalog_url() -> String {
    "https://www.arbookfind.co.uk/".to_string()
}

fn default_user_type() -> String {
    crate::catalog::session::DEFAULT_USER_TYPE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_lookup_url() -> String {
    crate::lookup::OPEN_LIBRARY_BASE_URL.to_string()
}

fn default_language() -> String {
    crate::lookup::DEFAULT_LANGUAGE.to_string()
}

fn default_lookup_timeout_secs() -> u64 {
    15
}

fn default_max_concurrent_probes() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_rerank_endpoint() -> String {
    crate::rerank::DEFAULT_ENDPOINT.to_string()
}

fn default_rerank_model() -> String {
    crate::rerank::DEFAULT_MODEL.to_string()
}

fn default_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())
}

fn default_temperature() -> f32 {
    crate::rerank::DEFAULT_TEMPERATURE
}

/// Load configuration from an optional file plus `BOOKFIND_` environment variables.
///
/// Without an explicit path, [`find_config_file`] is consulted.
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    match path.map(Path::to_path_buf).or_else(find_config_file) {
        Some(file) => {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(file.as_path()));
        }
        None => tracing::debug!("No configuration file found, using defaults"),
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// First existing `bookfind.toml` in the working directory or the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("bookfind").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}
