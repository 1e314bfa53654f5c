//! Load configuration for compiling text dumps

use crate::errors::{ForestError, Result};
use crate::forest::Forest;
use crate::text::{load_text, load_text_discovering};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// How a text dump is turned into a forest and how it is evaluated by tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of classes; 2 for binary models
    pub n_classes: usize,
    /// Fixed feature schema; features are discovered from the dump when unset
    pub features: Option<Vec<String>>,
    /// Additive base response used by evaluation tools
    pub base_response: f32,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_classes: 2,
            features: None,
            base_response: 0.0,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ForestConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ForestConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Override fields from `FASTFOREST_N_CLASSES` and `FASTFOREST_LOG`.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("FASTFOREST_N_CLASSES") {
            self.n_classes = val.trim().parse().map_err(|_| {
                ForestError::InvalidConfig(format!("FASTFOREST_N_CLASSES={val} is not a number"))
            })?;
        }
        if let Ok(val) = std::env::var("FASTFOREST_LOG") {
            self.logging.level = val;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_classes < 2 {
            return Err(ForestError::InvalidClassCount(self.n_classes));
        }
        if matches!(&self.features, Some(features) if features.is_empty()) {
            return Err(ForestError::InvalidConfig(
                "`features` is empty; omit it to discover features from the dump".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            warn!("Unknown log level `{}`, tools fall back to info", self.logging.level);
        }
        Ok(())
    }
}

/// Compile a text dump according to `config`.
///
/// Returns the feature names in column order: the configured schema, or the
/// names discovered in the dump.
pub fn load_text_with_config<P: AsRef<Path>>(
    path: P,
    config: &ForestConfig,
) -> Result<(Forest, Vec<String>)> {
    config.validate()?;
    match &config.features {
        Some(features) => {
            let forest = load_text(path, features, config.n_classes)?;
            Ok((forest, features.clone()))
        }
        None => load_text_discovering(path, config.n_classes),
    }
}
