//! Configuration for the opsboard tools.
//!
//! Settings come from an optional TOML file under the platform config dir,
//! overridable with `OPSBOARD_*` environment variables.

use std::path::PathBuf;

use config::{Environment, File};
use serde::Deserialize;

use crate::error::{OpsboardError, OpsboardResult};

pub const DEFAULT_PORT: u16 = 4117;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding one JSON file per collection.
    data_dir: PathBuf,
    pub port: u16,
}

impl Config {
    pub fn load() -> OpsboardResult<Self> {
        let mut builder = config::Config::builder()
            .set_default("data_dir", default_data_dir().to_string_lossy().into_owned())
            .map_err(|e| OpsboardError::Config(e.to_string()))?
            .set_default("port", i64::from(DEFAULT_PORT))
            .map_err(|e| OpsboardError::Config(e.to_string()))?;

        if let Some(path) = Self::config_path() {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .add_source(Environment::with_prefix("OPSBOARD"))
            .build()
            .map_err(|e| OpsboardError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| OpsboardError::Config(e.to_string()))
    }

    /// The data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned();
        PathBuf::from(expanded)
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("opsboard").join("config.toml"))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("opsboard")
}
