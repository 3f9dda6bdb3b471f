//! Mapper configuration loaded from TOML.
//!
//! ```toml
//! default_space = "social"
//! refresh_on_access = false
//! mappers = ["mappers/person.toml"]
//!
//! [pool]
//! capacity = 8
//! min_idle = 1
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, Result};
use crate::pool::PoolOptions;

/// Pool section of the configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of live sessions.
    pub capacity: usize,
    /// Sessions opened at startup.
    pub min_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let opts = PoolOptions::default();
        Self {
            capacity: opts.capacity,
            min_idle: opts.min_idle,
        }
    }
}

impl From<&PoolConfig> for PoolOptions {
    fn from(cfg: &PoolConfig) -> Self {
        PoolOptions {
            capacity: cfg.capacity,
            min_idle: cfg.min_idle,
        }
    }
}

/// Process-wide mapper settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Space used when neither method nor interface declares one.
    pub default_space: String,
    /// Re-read mapper files on every lookup (development mode).
    #[serde(default)]
    pub refresh_on_access: bool,
    /// Session pool sizing.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Mapper files to register at startup. Relative paths resolve against
    /// the configuration file's directory.
    #[serde(default)]
    pub mappers: Vec<PathBuf>,
}

impl MapperConfig {
    /// Minimal configuration with the given default space.
    pub fn new(default_space: impl Into<String>) -> Self {
        Self {
            default_space: default_space.into(),
            refresh_on_access: false,
            pool: PoolConfig::default(),
            mappers: Vec::new(),
        }
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: MapperConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            MapperError::Configuration(format!("failed to read {}: {err}", path.display()))
        })?;
        let mut cfg = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            for mapper in &mut cfg.mappers {
                if mapper.is_relative() {
                    *mapper = base.join(&*mapper);
                }
            }
        }
        Ok(cfg)
    }

    /// Rejects an empty default space and invalid pool sizing.
    pub fn validate(&self) -> Result<()> {
        if self.default_space.trim().is_empty() {
            return Err(MapperError::Configuration(
                "default_space must not be empty".into(),
            ));
        }
        PoolOptions::from(&self.pool).validate()
    }
}
