// crates/quarry/src/llm/http_client.rs
// HTTP transport with bounded retry for LLM endpoints

use anyhow::{Result, anyhow};
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

/// Maximum retry attempts for transient failures
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Base backoff between retries (doubles each attempt)
const DEFAULT_BASE_BACKOFF_SECS: u64 = 1;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Shared HTTP client for chat completions
pub struct LlmHttpClient {
    client: Client,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for LlmHttpClient {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }
}

impl LlmHttpClient {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: Duration::from_secs(DEFAULT_BASE_BACKOFF_SECS),
        }
    }

    /// POST a JSON body, adding Bearer auth when a key is present.
    /// Returns the response body as text on success.
    pub async fn post_json(
        &self,
        request_id: &str,
        url: &str,
        api_key: Option<&str>,
        body: String,
    ) -> Result<String> {
        let mut attempts = 0;
        let mut backoff = self.base_backoff;

        loop {
            let mut request = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .body(body.clone());
            if let Some(key) = api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    }

                    let error_body = response.text().await.unwrap_or_default();
                    if attempts < self.max_attempts
                        && (status.as_u16() == 429 || status.is_server_error())
                    {
                        warn!(
                            request_id = %request_id,
                            status = %status,
                            error = %error_body,
                            "Transient error, retrying in {:?}...",
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        backoff *= 2;
                        continue;
                    }

                    return Err(anyhow!("API error {}: {}", status, error_body));
                }
                Err(e) => {
                    // Only connect/timeout failures are safe to resend
                    if attempts < self.max_attempts && (e.is_connect() || e.is_timeout()) {
                        warn!(
                            request_id = %request_id,
                            error = %e,
                            "Request failed (connect/timeout), retrying in {:?}...",
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        backoff *= 2;
                        continue;
                    }
                    return Err(anyhow!("Request failed after retries: {}", e));
                }
            }
        }
    }
}
