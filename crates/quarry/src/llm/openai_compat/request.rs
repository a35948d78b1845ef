// crates/quarry/src/llm/openai_compat/request.rs
// OpenAI-compatible chat request builder

use crate::llm::{Message, Sampling};
use serde::Serialize;

/// Chat completion request (OpenAI-compatible format)
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }

    /// Apply temperature, top_p and max_tokens
    pub fn with_sampling(mut self, sampling: &Sampling) -> Self {
        self.temperature = Some(sampling.temperature);
        self.top_p = Some(sampling.top_p);
        self.max_tokens = sampling.max_tokens;
        self
    }
}
