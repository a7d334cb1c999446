// src/config.rs

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Data tree location
    #[serde(default)]
    pub data: DataConfig,

    /// Cache refresh and detail-load behavior
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.data.dir.as_os_str().is_empty() {
            return Err(AppError::config("data.dir is empty"));
        }
        if self.cache.refresh_interval_secs == 0 {
            return Err(AppError::config("cache.refresh_interval_secs must be > 0"));
        }
        if self.cache.rebuild_timeout_secs == 0 {
            return Err(AppError::config("cache.rebuild_timeout_secs must be > 0"));
        }
        if self.cache.detail_timeout_secs == 0 {
            return Err(AppError::config("cache.detail_timeout_secs must be > 0"));
        }
        if self.cache.search_concurrency == 0 {
            return Err(AppError::config("cache.search_concurrency must be > 0"));
        }
        Ok(())
    }
}

/// Location of the scraper-produced data tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Base directory holding `<year>/current_meta.json` and `<year>/json/`
    #[serde(default = "defaults::data_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: defaults::data_dir(),
        }
    }
}

/// Cache and loader tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Interval between scheduled full rebuilds, in seconds (default 4 hours)
    #[serde(default = "defaults::refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Deadline for one full rebuild pass, in seconds
    #[serde(default = "defaults::rebuild_timeout")]
    pub rebuild_timeout_secs: u64,

    /// Deadline for one detail artifact load, in seconds
    #[serde(default = "defaults::detail_timeout")]
    pub detail_timeout_secs: u64,

    /// How long a failed detail load is served from cache before retrying
    #[serde(default = "defaults::failure_retry")]
    pub failure_retry_secs: u64,

    /// Concurrent detail loads during description search
    #[serde(default = "defaults::search_concurrency")]
    pub search_concurrency: usize,
}

impl CacheConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn rebuild_timeout(&self) -> Duration {
        Duration::from_secs(self.rebuild_timeout_secs)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }

    pub fn failure_retry(&self) -> Duration {
        Duration::from_secs(self.failure_retry_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: defaults::refresh_interval(),
            rebuild_timeout_secs: defaults::rebuild_timeout(),
            detail_timeout_secs: defaults::detail_timeout(),
            failure_retry_secs: defaults::failure_retry(),
            search_concurrency: defaults::search_concurrency(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn data_dir() -> PathBuf {
        PathBuf::from("IPO_DATA")
    }
    pub fn refresh_interval() -> u64 {
        4 * 60 * 60
    }
    pub fn rebuild_timeout() -> u64 {
        120
    }
    pub fn detail_timeout() -> u64 {
        10
    }
    pub fn failure_retry() -> u64 {
        30
    }
    pub fn search_concurrency() -> usize {
        5
    }
    pub fn log_level() -> String {
        "info".into()
    }
}
