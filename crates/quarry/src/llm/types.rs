// crates/quarry/src/llm/types.rs
// Chat message and completion types shared by LLM clients

use serde::{Deserialize, Serialize};

/// A single chat message (OpenAI-compatible shape)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Token usage reported by the endpoint
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Result of a non-streaming chat call
#[derive(Debug, Clone)]
pub struct ChatResult {
    pub request_id: String,
    pub content: Option<String>,
    pub usage: Option<Usage>,
    pub duration_ms: u64,
}
