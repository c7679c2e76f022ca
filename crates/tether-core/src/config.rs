//! tether.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TetherConfig {
    pub store: StoreConfig,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the embedded link database.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Tracing filter directive, e.g. "info,tether=debug".
    pub filter: Option<String>,
}

impl Default for TetherConfig {
    fn default() -> Self {
        TetherConfig {
            store: StoreConfig {
                path: PathBuf::from("tether.redb"),
            },
            log: None,
        }
    }
}

impl TetherConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TetherConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from an explicit path, or fall back to defaults when no
    /// config file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}
