// crates/quarry/src/reasoning/llm_reasoner.rs
// Reasoner implementation that prompts an LLM client

use super::signature::parse_fields;
use super::{Fields, Reasoner, Role};
use crate::error::{QuarryError, Result};
use crate::llm::LlmClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Reasoner that renders each role's signature as a chat prompt
pub struct LlmReasoner {
    client: Arc<dyn LlmClient>,
}

impl LlmReasoner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    #[instrument(skip_all, fields(role = %role))]
    async fn invoke(&self, role: Role, inputs: &Fields) -> Result<Fields> {
        let signature = role.signature();
        let messages = signature.build_messages(inputs);

        let result = self
            .client
            .chat(messages)
            .await
            .map_err(|e| QuarryError::Llm(e.to_string()))?;

        let content = result
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| QuarryError::Llm(format!("empty response for role {}", role)))?;

        let parsed = parse_fields(signature, &content);
        let missing: Vec<_> = signature
            .answer_fields()
            .into_iter()
            .filter(|name| !parsed.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            warn!(role = %role, missing = ?missing, "Model omitted output fields");
        }
        debug!(role = %role, fields = parsed.len(), "Parsed reasoning output");

        Ok(parsed)
    }
}
