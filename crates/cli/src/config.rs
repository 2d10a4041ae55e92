//! Configuration loading from purser.toml.

use model::CatalogEntry;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tool server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Local model serving settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Extra catalog entries beyond the built-in set.
    #[serde(default)]
    pub models: Vec<CatalogEntry>,

    /// Optional external employee API backing the demo tool.
    #[serde(default)]
    pub employee_api: EmployeeApiConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the tool server binds to, and clients connect to.
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Alias to resolve when no model is named on the command line.
    #[serde(default = "default_alias")]
    pub alias: String,

    /// Base URL of the local inference server.
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// Where downloaded artifacts live.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            engine_url: default_engine_url(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct EmployeeApiConfig {
    /// When set, the employee tool calls `GET {base_url}/employees/{name}`
    /// instead of answering locally.
    pub base_url: Option<String>,
}

fn default_addr() -> String {
    "127.0.0.1:5231".to_string()
}

fn default_alias() -> String {
    "qwen2.5-14b".to_string()
}

fn default_engine_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from the given path if it exists, else defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.model
            .cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".purser/models"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
