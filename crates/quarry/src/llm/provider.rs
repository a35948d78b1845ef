// crates/quarry/src/llm/provider.rs
// LLM provider abstraction layer

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ChatResult, Message};

/// Kind of OpenAI-compatible endpoint in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local Ollama server (no auth)
    Ollama,
    /// Any hosted OpenAI-compatible API (Bearer auth)
    OpenAi,
}

impl Provider {
    /// Infer the provider from a base URL and whether a key is configured
    pub fn detect(base_url: &str, has_api_key: bool) -> Self {
        if !has_api_key && super::is_local_url(base_url) {
            Self::Ollama
        } else {
            Self::OpenAi
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Sampling parameters applied to every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.9,
            max_tokens: None,
        }
    }
}

/// Trait for LLM clients
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResult>;

    /// Get the provider type
    fn provider_type(&self) -> Provider;

    /// Model identifier sent with each request
    fn model_name(&self) -> String;
}
