//! Runtime configuration
//!
//! Defaults, overlaid by an optional YAML file, overlaid by CLI flags (the
//! binary applies those). The resulting value is passed explicitly to the
//! pipeline.

use crate::analysis::{AggregationConfig, ExtractorKind};
use crate::report::ReportFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    /// Extractors to run, by id
    pub extractors: Vec<ExtractorKind>,
    pub aggregation: AggregationConfig,
    pub extractor_timeout_ms: u64,
    pub report_format: ReportFormat,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            extractors: ExtractorKind::ALL.to_vec(),
            aggregation: AggregationConfig::default(),
            extractor_timeout_ms: 2000,
            report_format: ReportFormat::Human,
        }
    }
}

impl AttributeConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the per-user file is read
    /// when present, otherwise the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_path().filter(|p| p.is_file()) {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "loaded configuration");
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.aggregation.threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold {} is outside [0, 1]",
                self.aggregation.threshold
            )));
        }
        if !unit.contains(&self.aggregation.min_evidence) {
            return Err(ConfigError::Invalid(format!(
                "min_evidence {} is outside [0, 1]",
                self.aggregation.min_evidence
            )));
        }
        if self.extractor_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "extractor_timeout_ms must be positive".to_string(),
            ));
        }
        if self.extractors.is_empty() {
            return Err(ConfigError::Invalid("no extractors selected".to_string()));
        }
        Ok(())
    }

    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_millis(self.extractor_timeout_ms)
    }
}

/// Per-user config file (`~/.config/attribute/config.yaml` on Linux)
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("attribute").join("config.yaml"))
}
