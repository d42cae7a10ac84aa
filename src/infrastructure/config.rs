//! Application configuration.
//!
//! Read from `<config dir>/tflow/config.json`; every field is optional and
//! falls back to its default. A few environment variables override the file.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::catalog_source::CatalogSource;
use crate::domain::{DEFAULT_COUNTDOWN, SortDirection};

pub const ENV_DATA_DIR: &str = "TFLOW_DATA_DIR";
pub const ENV_CATALOG: &str = "TFLOW_CATALOG";
pub const ENV_TICK_MS: &str = "TFLOW_TICK_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding saved flows and the log file.
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    /// Event-loop poll interval.
    pub tick_rate_ms: u64,
    /// Quiet period after the last edit before the flow is auto-saved.
    pub autosave_delay_ms: u64,
    pub default_sort: SortDirection,
    pub countdown_seconds: u32,
    pub catalog: CatalogSource,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tflow");
        Self {
            log_file: data_dir.join("tflow.log"),
            data_dir,
            tick_rate_ms: 250,
            autosave_delay_ms: 2000,
            default_sort: SortDirection::Ascending,
            countdown_seconds: DEFAULT_COUNTDOWN,
            catalog: CatalogSource::Builtin,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tflow")
            .join("config.json")
    }

    /// Loads the default config file, then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::default_path())?;
        config.apply_overrides(|var| env::var(var).ok())?;
        Ok(config)
    }

    /// Reads a config file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from a variable lookup, normally the process env.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
            self.log_file = self.data_dir.join("tflow.log");
        }
        if let Some(catalog) = lookup(ENV_CATALOG) {
            self.catalog = CatalogSource::parse(&catalog);
        }
        if let Some(value) = lookup(ENV_TICK_MS) {
            self.tick_rate_ms = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidEnv {
                    var: ENV_TICK_MS,
                    value,
                })?;
        }
        Ok(())
    }

    /// Directory backing the key/value flow store.
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }
}
