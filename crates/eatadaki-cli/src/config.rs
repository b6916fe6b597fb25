//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eatadaki_types::Coordinate;
use serde::{Deserialize, Serialize};

use crate::cli::OutputFormat;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the databases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Default output format ("text" or "json")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Default reference point for distance sorting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<HomeConfig>,
}

/// `[home]` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomeConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl Config {
    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eatadaki")
            .join("config.toml")
    }

    /// Load config from `path`, or return the default if it does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Save config to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Home coordinate, validated.
    pub fn home(&self) -> Result<Option<Coordinate>> {
        self.home
            .map(|home| {
                Coordinate::validated(home.latitude, home.longitude)
                    .context("Invalid [home] coordinate in config")
            })
            .transpose()
    }

    /// Configured output format, if any.
    pub fn output_format(&self) -> Result<Option<OutputFormat>> {
        self.format
            .as_deref()
            .map(|format| {
                format
                    .parse::<OutputFormat>()
                    .map_err(|e| anyhow::anyhow!("Invalid format in config: {e}"))
            })
            .transpose()
    }
}

/// Resolve the data directory: flag, then config, then platform default.
pub fn resolve_data_dir(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    flag.or_else(|| config.data_dir.clone())
        .unwrap_or_else(eatadaki_store::default_data_dir)
}

/// Resolve the output format: flag, then config, then text.
pub fn resolve_format(flag: Option<OutputFormat>, config: &Config) -> Result<OutputFormat> {
    match flag {
        Some(format) => Ok(format),
        None => Ok(config.output_format()?.unwrap_or_default()),
    }
}
