//! Process configuration read from environment-style keys.
//!
//! # Invariants
//! - All missing required keys are reported together.
//! - Optional keys fall back to documented defaults.

use crate::logging::{default_log_level, normalize_level};
use crate::mapping::{Pagination, DEFAULT_PAGE_SIZE};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DATASOURCES_SQLITE_PATH: &str = "DATASOURCES_SQLITE_PATH";
pub const LOG_DIR: &str = "LOG_DIR";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const DEFAULT_PAGE_SIZE_KEY: &str = "DEFAULT_PAGE_SIZE";

const REQUIRED_KEYS: &[&str] = &[DATASOURCES_SQLITE_PATH, LOG_DIR];

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(Vec<&'static str>),
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(keys) => {
                write!(f, "missing required configuration: {}", keys.join(", "))
            }
            Self::Invalid { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Settings needed to bring up the contractor core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_dir: String,
    pub log_level: &'static str,
    pub default_page_size: i64,
}

impl CoreConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    /// - See [`CoreConfig::from_lookup`].
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    ///
    /// # Errors
    /// - [`ConfigError::Missing`] listing every unset required key.
    /// - [`ConfigError::Invalid`] for an unknown log level or a non-positive
    ///   page size.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| read(*key).is_none())
            .collect();
        let (Some(db_path), Some(log_dir)) = (read(DATASOURCES_SQLITE_PATH), read(LOG_DIR)) else {
            return Err(ConfigError::Missing(missing));
        };

        let log_level = match read(LOG_LEVEL) {
            Some(value) => normalize_level(&value).map_err(|reason| ConfigError::Invalid {
                key: LOG_LEVEL,
                value,
                reason,
            })?,
            None => default_log_level(),
        };

        let default_page_size = match read(DEFAULT_PAGE_SIZE_KEY) {
            Some(value) => parse_page_size(value)?,
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            db_path: PathBuf::from(db_path.trim()),
            log_dir: log_dir.trim().to_string(),
            log_level,
            default_page_size,
        })
    }

    /// Pagination for a client request, using the configured default size.
    pub fn pagination(&self, page: Option<i64>, size: Option<i64>) -> Pagination {
        Pagination::new(
            page.unwrap_or(0).max(0),
            size.filter(|size| *size > 0)
                .unwrap_or(self.default_page_size),
        )
    }
}

fn parse_page_size(value: String) -> ConfigResult<i64> {
    match value.trim().parse::<i64>() {
        Ok(size) if size > 0 => Ok(size),
        Ok(_) => Err(ConfigError::Invalid {
            key: DEFAULT_PAGE_SIZE_KEY,
            value,
            reason: "must be positive".to_string(),
        }),
        Err(err) => Err(ConfigError::Invalid {
            key: DEFAULT_PAGE_SIZE_KEY,
            reason: err.to_string(),
            value,
        }),
    }
}
