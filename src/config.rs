//! Search service configuration.
//!
//! Loaded from an optional TOML file, then overridden from the environment:
//!
//! ```toml
//! cache_enabled = true
//! cache_capacity = 1024
//! doc_count_ttl_secs = 600
//! ranker = "score"
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `CATALOG_SEARCH_CACHE_ENABLED` | `cache_enabled` |
//! | `CATALOG_SEARCH_CACHE_CAPACITY` | `cache_capacity` |
//! | `CATALOG_SEARCH_DOC_COUNT_TTL_SECS` | `doc_count_ttl_secs` |
//! | `CATALOG_SEARCH_RANKER` | `ranker` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::search::ranker::RankerKind;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchServiceConfig {
    pub cache_enabled: bool,
    /// Maximum number of cached result pages. Zero disables storage.
    pub cache_capacity: usize,
    pub doc_count_ttl_secs: u64,
    pub ranker: RankerKind,
}

impl Default for SearchServiceConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_capacity: 1024,
            doc_count_ttl_secs: 600,
            ranker: RankerKind::Score,
        }
    }
}

impl SearchServiceConfig {
    /// Defaults overridden from the environment. Not validated; see [`load_env`](Self::load_env).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// As [`from_env`](Self::from_env), rejecting combinations `validate` refuses.
    pub fn load_env() -> Result<Self, ConfigError> {
        let cfg = Self::from_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path`, then apply environment overrides. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_enabled && self.cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "cache_capacity must be positive when the cache is enabled".into(),
            ));
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(val) = dotenvy::var("CATALOG_SEARCH_CACHE_ENABLED") {
            match parse_bool(&val) {
                Some(parsed) => self.cache_enabled = parsed,
                None => warn!(value = %val, "ignoring invalid CATALOG_SEARCH_CACHE_ENABLED"),
            }
        }
        if let Ok(val) = dotenvy::var("CATALOG_SEARCH_CACHE_CAPACITY") {
            match val.trim().parse::<usize>() {
                Ok(parsed) => self.cache_capacity = parsed,
                Err(e) => warn!(value = %val, error = %e, "ignoring invalid CATALOG_SEARCH_CACHE_CAPACITY"),
            }
        }
        if let Ok(val) = dotenvy::var("CATALOG_SEARCH_DOC_COUNT_TTL_SECS") {
            match val.trim().parse::<u64>() {
                Ok(parsed) => self.doc_count_ttl_secs = parsed,
                Err(e) => warn!(value = %val, error = %e, "ignoring invalid CATALOG_SEARCH_DOC_COUNT_TTL_SECS"),
            }
        }
        if let Ok(val) = dotenvy::var("CATALOG_SEARCH_RANKER") {
            match val.parse::<RankerKind>() {
                Ok(parsed) => self.ranker = parsed,
                Err(e) => warn!(error = %e, "ignoring invalid CATALOG_SEARCH_RANKER"),
            }
        }
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
