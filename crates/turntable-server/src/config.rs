use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use turntable_core::{PipelineConfig, PipelineConfigError};

/// Names the TOML file to read at startup.
pub const CONFIG_ENV: &str = "TURNTABLE_CONFIG";
/// Overrides `addr` from the file.
pub const ADDR_ENV: &str = "TURNTABLE_ADDR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid pipeline settings: {0}")]
    Pipeline(#[from] PipelineConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Built web tool, served at `/`.
    pub dist_dir: PathBuf,
    /// Finished archives land here.
    pub output_dir: PathBuf,
    pub max_model_bytes: usize,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            dist_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../turntable-web/dist"),
            output_dir: PathBuf::from("output"),
            max_model_bytes: 64 * 1024 * 1024,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reads the file named by `TURNTABLE_CONFIG` (defaults otherwise), then
    /// applies `TURNTABLE_ADDR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    fn resolve(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match var(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(addr) = var(ADDR_ENV).filter(|a| !a.trim().is_empty()) {
            config.addr = addr;
        }
        Ok(config)
    }
}
