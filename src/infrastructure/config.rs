//! Grader configuration, read from an optional TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_RATES_URL: &str = "https://open.er-api.com/v6/latest/USD";
pub const DEFAULT_RATES_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SUBMISSION_SUFFIX: &str = "_MA1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings for a grading run. Every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub rates_url: String,
    pub rates_timeout_secs: u64,
    /// JSON map of feedback code to message template.
    pub templates: Option<PathBuf>,
    /// Stripped from snapshot file stems to get the student name.
    pub submission_suffix: String,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            rates_url: DEFAULT_RATES_URL.to_string(),
            rates_timeout_secs: DEFAULT_RATES_TIMEOUT_SECS,
            templates: None,
            submission_suffix: DEFAULT_SUBMISSION_SUFFIX.to_string(),
        }
    }
}

impl GraderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: GraderConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        // Template paths are relative to the config file.
        if let (Some(templates), Some(parent)) = (&config.templates, path.parent()) {
            if templates.is_relative() {
                config.templates = Some(parent.join(templates));
            }
        }
        Ok(config)
    }

    /// The file's settings, or defaults when no file is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
