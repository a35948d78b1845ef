// crates/quarry/src/config/mod.rs
// Configuration: file + environment + CLI overrides resolved into Settings

pub mod env;
pub mod file;

pub use env::EnvConfig;
pub use file::QuarryConfig;

use crate::error::{QuarryError, Result};
use crate::llm::is_local_url;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "phi3.5:3.8b-mini-instruct-q4_K_M";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TOP_P: f32 = 0.9;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_DB_PATH: &str = "data/northwind.sqlite";
pub const DEFAULT_DOCS_PATH: &str = "docs";
pub const DEFAULT_TRACE_PATH: &str = "agent_trace.jsonl";

/// Values supplied on the command line (highest precedence)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub db: Option<PathBuf>,
    pub docs: Option<PathBuf>,
    pub trace: Option<PathBuf>,
    pub no_trace: bool,
    pub top_k: Option<usize>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    pub top_k: usize,
    pub chunk_size: usize,
    pub db_path: PathBuf,
    pub docs_path: PathBuf,
    /// `None` when tracing to file is disabled
    pub trace_path: Option<PathBuf>,
}

impl Settings {
    /// Resolve settings with precedence CLI > env > file > defaults
    pub fn resolve(overrides: &Overrides, env: &EnvConfig, file: &QuarryConfig) -> Self {
        let trace_path = if overrides.no_trace || env.disable_trace {
            None
        } else {
            Some(
                overrides
                    .trace
                    .clone()
                    .or_else(|| env.trace_file.clone().map(PathBuf::from))
                    .or_else(|| file.paths.trace.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACE_PATH)),
            )
        };

        Self {
            model: overrides
                .model
                .clone()
                .or_else(|| env.model.clone())
                .or_else(|| file.llm.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: overrides
                .base_url
                .clone()
                .or_else(|| env.base_url.clone())
                .or_else(|| file.llm.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: overrides
                .api_key
                .clone()
                .or_else(|| env.api_key.clone())
                .or_else(|| file.llm.api_key.clone())
                .filter(|k| !k.trim().is_empty()),
            temperature: file.llm.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: file.llm.top_p.unwrap_or(DEFAULT_TOP_P),
            max_tokens: file.llm.max_tokens,
            top_k: overrides
                .top_k
                .or(file.retrieval.top_k)
                .unwrap_or(DEFAULT_TOP_K),
            chunk_size: file.retrieval.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            db_path: overrides
                .db
                .clone()
                .or_else(|| file.paths.db.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            docs_path: overrides
                .docs
                .clone()
                .or_else(|| file.paths.docs.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCS_PATH)),
            trace_path,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        if !self.db_path.is_file() {
            validation.add_error(format!("Database not found: {}", self.db_path.display()));
        }
        if !self.docs_path.is_dir() {
            validation.add_error(format!(
                "Docs directory not found: {}",
                self.docs_path.display()
            ));
        }
        if url::Url::parse(&self.base_url).is_err() {
            validation.add_error(format!("Invalid LLM base URL: {}", self.base_url));
        } else if !is_local_url(&self.base_url) && self.api_key.is_none() {
            validation.add_warning(format!(
                "LLM endpoint {} is not local and no API key is set (QUARRY_API_KEY)",
                self.base_url
            ));
        }
        if self.top_k == 0 {
            validation.add_warning("retrieval.top_k is 0; no documents will be retrieved");
        }
        if self.chunk_size < 50 {
            validation.add_warning(format!(
                "retrieval.chunk_size {} is very small; fragments will lack context",
                self.chunk_size
            ));
        }

        validation
    }
}

/// Configuration validation result
#[derive(Debug)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for ConfigValidation {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidation {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Fail with every collected error; warnings never fail
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(QuarryError::Config(self.errors.join("; ")))
        }
    }

    /// Format as a human-readable report
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        if !self.errors.is_empty() {
            lines.push("Errors:".to_string());
            for err in &self.errors {
                lines.push(format!("  - {}", err));
            }
        }

        if !self.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            for warn in &self.warnings {
                lines.push(format!("  - {}", warn));
            }
        }

        if lines.is_empty() {
            "Configuration OK".to_string()
        } else {
            lines.join("\n")
        }
    }
}
