//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `FRAUD__<SECTION>__<KEY>` environment variables.

use crate::model::{ModelConfig, TrainingConfig};
use config::{Config, Environment, File};
use fraud_core::{FraudError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/fraud.toml";
const ENV_PREFIX: &str = "FRAUD";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub artifacts: ModelConfig,
    pub training: TrainingConfig,
    pub recorder: RecorderConfig,
    pub logging: LoggingConfig,
}

/// Prediction log settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecorderConfig {
    /// JSONL file the recorder appends to
    pub log_path: PathBuf,
    /// Records buffered before a write
    pub buffer_size: usize,
    /// Records kept in memory for `recent`
    pub history_size: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("logs/predictions.jsonl"),
            buffer_size: 100,
            history_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load from a TOML file (absent file means defaults) with env overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| FraudError::ConfigError(format!("failed to build configuration: {}", e)))?;

        config
            .try_deserialize()
            .map_err(|e| FraudError::ConfigError(format!("failed to deserialize configuration: {}", e)))
    }
}
