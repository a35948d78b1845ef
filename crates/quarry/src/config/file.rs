// crates/quarry/src/config/file.rs
// File-based configuration from ~/.quarry/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level config structure
#[derive(Debug, Deserialize, Default)]
pub struct QuarryConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub paths: PathsSection,
}

/// `[llm]` section
#[derive(Debug, Deserialize, Default)]
pub struct LlmSection {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// `[retrieval]` section
#[derive(Debug, Deserialize, Default)]
pub struct RetrievalSection {
    pub top_k: Option<usize>,
    pub chunk_size: Option<usize>,
}

/// `[paths]` section
#[derive(Debug, Deserialize, Default)]
pub struct PathsSection {
    pub db: Option<PathBuf>,
    pub docs: Option<PathBuf>,
    pub trace: Option<PathBuf>,
}

impl QuarryConfig {
    /// Load config from ~/.quarry/config.toml
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".quarry")
            .join("config.toml")
    }
}
