//! Muster configuration.
//!
//! Loaded from `~/.muster/config.toml`, or from the path given with
//! `--config`. Switching events rewrites `event-key` in place.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::storage::Storage;

/// Errors loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,

    #[error(
        "no config file found at {}\n\
         Create one with at minimum:\n\n\
         event-key = \"2025wasno\"",
        .0.display()
    )]
    Missing(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("event-key is empty in {}", .0.display())]
    EmptyEvent(PathBuf),

    #[error("failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

/// Muster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Active event identifier, e.g. `2025wasno`.
    pub event_key: String,

    /// Reconcile several observers per subject instead of taking one.
    #[serde(default)]
    pub multi_scouting: bool,

    /// Reports a subject needs before it is written, in multi-scouting mode.
    #[serde(default = "default_expected_observers")]
    pub expected_observers: usize,

    /// Store root. Defaults to `~/.muster/store`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default = "default_match_target")]
    pub match_target: String,

    #[serde(default = "default_pit_target")]
    pub pit_target: String,

    /// Upper bound on one report's processing, lock waits and row write included.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_expected_observers() -> usize {
    3
}

fn default_match_target() -> String {
    "RawData".into()
}

fn default_pit_target() -> String {
    "PitScouting".into()
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

impl Config {
    /// Load config from `path`, or `~/.muster/config.toml` when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path().ok_or(ConfigError::NoHome)?,
        };
        if !path.exists() {
            return Err(ConfigError::Missing(path));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents, &path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.event_key.trim().is_empty() {
            return Err(ConfigError::EmptyEvent(path.to_path_buf()));
        }
        Ok(config)
    }

    /// Write the config back to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason,
        };
        let contents = toml::to_string(self).map_err(|e| write_err(e.to_string()))?;
        fs::write(path, contents).map_err(|e| write_err(e.to_string()))
    }

    /// The config file path: `~/.muster/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".muster").join("config.toml"))
    }

    /// The store root, falling back to the default location.
    pub fn root(&self) -> PathBuf {
        self.root
            .clone()
            .or_else(Storage::default_root)
            .unwrap_or_else(|| PathBuf::from(".muster-store"))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
