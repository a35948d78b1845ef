// crates/quarry/src/llm/mod.rs
// LLM inference client (OpenAI-compatible chat completions)

mod client;
mod http_client;
mod logging;
mod openai_compat;
mod provider;
mod types;

pub use client::{OpenAiCompatClient, is_local_url, normalize_base_url};
pub use http_client::LlmHttpClient;
pub use provider::{LlmClient, Provider, Sampling};
pub use types::{ChatResult, Message, Usage};
