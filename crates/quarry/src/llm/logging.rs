// crates/quarry/src/llm/logging.rs
// Shared LLM logging helpers

use super::types::Usage;
use tracing::info;

/// Log usage statistics for an LLM call.
pub fn log_usage(request_id: &str, provider: &str, usage: &Usage) {
    info!(
        request_id = %request_id,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "{} usage stats", provider
    );
}

/// Log completion summary for an LLM call.
pub fn log_completion(request_id: &str, provider: &str, duration_ms: u64, content_len: usize) {
    info!(
        request_id = %request_id,
        duration_ms = duration_ms,
        content_len = content_len,
        "{} chat complete", provider
    );
}
