//! Indexer configuration.
//!
//! # Responsibility
//! - Describe every tunable of the crawler and query paths in one value
//!   that is handed to components at construction.
//! - Load that value from a TOML file.
//!
//! # Invariants
//! - A missing file yields defaults; a present but invalid file is an
//!   error, never silently replaced by defaults.
//! - `validate()` succeeds before any component is built from the config.

use crate::fetch::RetryPolicy;
use crate::logging::default_log_level;
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_FEED_URL: &str = "http://localhost:5000/as/collection.json";
const DEFAULT_DB_PATH: &str = "canvas_index.db";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_MAX_PAGES_PER_FEED: usize = 10_000;

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Network settings for the document fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Backoff base in seconds.
    pub backoff_factor: f64,
    /// HTTP statuses treated as transient.
    pub retry_statuses: Vec<u16>,
    /// Connect and overall request timeout.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            retries: policy.retries,
            backoff_factor: policy.backoff_factor,
            retry_statuses: policy.retry_statuses,
            timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            backoff_factor: self.backoff_factor,
            retry_statuses: self.retry_statuses.clone(),
        }
    }
}

/// Top-level indexer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    /// SQLite database file backing the index.
    pub db_path: PathBuf,
    /// Activity stream collection URLs, crawled in this order.
    pub feeds: Vec<String>,
    /// Interval between scheduled crawl runs.
    pub crawl_interval_hours: u64,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Upper bound on pages walked per feed and run.
    pub max_pages_per_feed: usize,
    pub fetch: FetchConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            feeds: vec![DEFAULT_FEED_URL.to_string()],
            crawl_interval_hours: 1,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            log_level: default_log_level().to_string(),
            max_pages_per_feed: DEFAULT_MAX_PAGES_PER_FEED,
            fetch: FetchConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Loads and validates the config at `path`, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "event=config_load module=config status=warn path={} error_code=config_missing using=defaults",
                path.display()
            );
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::Invalid("`feeds` must not be empty".to_string()));
        }
        if let Some(blank) = self.feeds.iter().find(|url| url.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "`feeds` contains a blank entry `{blank}`"
            )));
        }
        if self.crawl_interval_hours == 0 {
            return Err(ConfigError::Invalid(
                "`crawl_interval_hours` must be positive".to_string(),
            ));
        }
        if self.max_pages_per_feed == 0 {
            return Err(ConfigError::Invalid(
                "`max_pages_per_feed` must be positive".to_string(),
            ));
        }
        if !self.fetch.backoff_factor.is_finite() || self.fetch.backoff_factor < 0.0 {
            return Err(ConfigError::Invalid(
                "`fetch.backoff_factor` must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Feed URLs with surrounding whitespace removed.
    pub fn feed_urls(&self) -> Vec<String> {
        self.feeds.iter().map(|url| url.trim().to_string()).collect()
    }
}
