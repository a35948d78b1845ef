// crates/quarry/src/llm/openai_compat/response.rs
// OpenAI-compatible chat response parsing

use crate::llm::{ChatResult, Usage};
use anyhow::{Result, anyhow};
use serde::Deserialize;

/// Non-streaming chat response (OpenAI-compatible format)
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ResponseChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Parse an OpenAI-compatible chat response into a ChatResult
pub fn parse_chat_response(
    response_body: &str,
    request_id: &str,
    duration_ms: u64,
) -> Result<ChatResult> {
    let data: ChatResponse = serde_json::from_str(response_body)
        .map_err(|e| anyhow!("Failed to parse chat response: {}", e))?;

    let content = data
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content);

    Ok(ChatResult {
        request_id: request_id.to_owned(),
        content,
        usage: data.usage,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_response() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "[[ ## route ## ]]\nsql"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;

        let result = parse_chat_response(json, "test-123", 100).unwrap();
        assert_eq!(result.request_id, "test-123");
        assert_eq!(result.content.as_deref(), Some("[[ ## route ## ]]\nsql"));
        assert_eq!(result.usage.unwrap().total_tokens, 15);
        assert_eq!(result.duration_ms, 100);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(parse_chat_response("not json", "test", 0).is_err());
    }

    #[test]
    fn test_parse_empty_choices() {
        let result = parse_chat_response(r#"{"choices": [], "usage": null}"#, "test", 0).unwrap();
        assert!(result.content.is_none());
        assert!(result.usage.is_none());
    }

    #[test]
    fn test_parse_null_content() {
        let json = r#"{"choices": [{"message": {"content": null}}]}"#;
        let result = parse_chat_response(json, "test", 0).unwrap();
        assert!(result.content.is_none());
    }
}
