// crates/quarry/src/llm/client.rs
// OpenAI-compatible chat client (Ollama locally, any hosted endpoint with a key)

use crate::llm::http_client::LlmHttpClient;
use crate::llm::logging::{log_completion, log_usage};
use crate::llm::openai_compat::{ChatRequest, parse_chat_response};
use crate::llm::provider::{LlmClient, Provider, Sampling};
use crate::llm::{ChatResult, Message};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{Span, debug, instrument, warn};
use uuid::Uuid;

/// Normalize base URL by stripping trailing slashes and a /v1 suffix
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim_end_matches('/').to_string();
    if url.ends_with("/v1") {
        url.truncate(url.len() - 3);
    }
    url
}

/// Check if a URL points to a local address (localhost, 127.0.0.1, [::1])
pub fn is_local_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.host() {
            Some(url::Host::Domain(d)) => d == "localhost",
            Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            None => true,
        },
        Err(_) => true,
    }
}

/// Chat client for any `/v1/chat/completions` endpoint
pub struct OpenAiCompatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    sampling: Sampling,
    http: LlmHttpClient,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>) -> Self {
        let normalized = normalize_base_url(base_url);
        let api_key = api_key.filter(|k| !k.trim().is_empty());

        if !is_local_url(&normalized) && api_key.is_none() {
            warn!(
                base_url = %normalized,
                "LLM endpoint is not local and no API key is configured"
            );
        }

        Self {
            base_url: normalized,
            model: model.into(),
            api_key,
            sampling: Sampling::default(),
            http: LlmHttpClient::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Non-streaming chat completion
    #[instrument(skip(self, messages), fields(request_id, model = %self.model, message_count = messages.len()))]
    pub async fn chat(&self, messages: Vec<Message>) -> Result<ChatResult> {
        let request_id = Uuid::new_v4().to_string();
        let start_time = Instant::now();
        Span::current().record("request_id", &request_id);

        let provider = self.provider_type().to_string();
        let request = ChatRequest::new(&self.model, messages).with_sampling(&self.sampling);
        let body = serde_json::to_string(&request)?;
        debug!(request_id = %request_id, body_len = body.len(), "Sending chat request");

        let response_body = self
            .http
            .post_json(
                &request_id,
                &self.completions_url(),
                self.api_key.as_deref(),
                body,
            )
            .await?;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let result = parse_chat_response(&response_body, &request_id, duration_ms)?;

        if let Some(usage) = &result.usage {
            log_usage(&request_id, &provider, usage);
        }
        log_completion(
            &request_id,
            &provider,
            duration_ms,
            result.content.as_deref().map_or(0, str::len),
        );

        Ok(result)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResult> {
        self.chat(messages).await
    }

    fn provider_type(&self) -> Provider {
        Provider::detect(&self.base_url, self.api_key.is_some())
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAiCompatClient::new("http://localhost:11434", "phi3.5", None);
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.model_name(), "phi3.5");
        assert_eq!(client.provider_type(), Provider::Ollama);
        assert_eq!(
            client.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_hosted_client_with_key() {
        let client =
            OpenAiCompatClient::new("https://api.example.com/v1/", "gpt", Some("sk-1".into()));
        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(client.provider_type(), Provider::OpenAi);
    }

    #[test]
    fn test_blank_key_is_ignored() {
        let client = OpenAiCompatClient::new("http://localhost:11434", "m", Some("  ".into()));
        assert!(client.api_key.is_none());
    }

    #[test]
    fn test_is_local_url() {
        assert!(is_local_url("http://localhost:11434"));
        assert!(is_local_url("http://127.0.0.1:11434"));
        assert!(is_local_url("http://[::1]:11434"));
        assert!(!is_local_url("http://192.168.1.100:11434"));
        assert!(!is_local_url("https://api.example.com"));
    }

    #[test]
    fn test_url_normalization() {
        assert_eq!(normalize_base_url("http://localhost:11434/v1"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434/v1/"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_chat_unreachable_endpoint_errors() {
        let mut client = OpenAiCompatClient::new("http://127.0.0.1:1", "m", None);
        client.http.max_attempts = 0;
        let result = client.chat(vec![Message::user("hi")]).await;
        assert!(result.is_err());
    }
}
