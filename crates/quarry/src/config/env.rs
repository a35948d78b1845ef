// crates/quarry/src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use crate::utils::parse_bool;
use tracing::{debug, info};

/// Environment configuration - all env vars in one place
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// Model name (QUARRY_MODEL)
    pub model: Option<String>,
    /// OpenAI-compatible endpoint (QUARRY_LLM_BASE_URL)
    pub base_url: Option<String>,
    /// API key (QUARRY_API_KEY, falling back to OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// Trace file override (QUARRY_TRACE_FILE)
    pub trace_file: Option<String>,
    /// Disable the JSONL trace entirely (QUARRY_DISABLE_TRACE)
    pub disable_trace: bool,
}

impl EnvConfig {
    /// Load all environment configuration (call once at startup)
    pub fn load() -> Self {
        info!("Loading environment configuration");

        let config = Self {
            model: read_var("QUARRY_MODEL"),
            base_url: read_var("QUARRY_LLM_BASE_URL"),
            api_key: read_var("QUARRY_API_KEY").or_else(|| read_var("OPENAI_API_KEY")),
            trace_file: read_var("QUARRY_TRACE_FILE"),
            disable_trace: parse_bool_env("QUARRY_DISABLE_TRACE").unwrap_or(false),
        };
        debug!(
            model = ?config.model,
            base_url = ?config.base_url,
            has_api_key = config.api_key.is_some(),
            "Environment configuration loaded"
        );
        config
    }
}

/// Read a single env var, filtering empty values
fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool_env(name: &str) -> Option<bool> {
    std::env::var(name).ok().as_deref().and_then(parse_bool)
}
