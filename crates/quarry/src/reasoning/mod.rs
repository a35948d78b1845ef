// crates/quarry/src/reasoning/mod.rs
// Structured-field reasoning roles backed by a language model

mod llm_reasoner;
mod signature;

pub use llm_reasoner::LlmReasoner;
pub use signature::{FieldSpec, Signature, parse_fields};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Named input or output fields for one reasoning call
pub type Fields = BTreeMap<String, String>;

/// The four reasoning roles the pipeline asks for
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, strum::EnumString, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Classify a question as rag / sql / hybrid
    Router,
    /// Extract constraints from retrieved documents
    Planner,
    /// Generate a SQLite query
    QueryGen,
    /// Compose the final answer, explanation and citations
    Synthesizer,
}

impl Role {
    pub fn signature(self) -> &'static Signature {
        match self {
            Role::Router => &signature::ROUTER,
            Role::Planner => &signature::PLANNER,
            Role::QueryGen => &signature::QUERY_GEN,
            Role::Synthesizer => &signature::SYNTHESIZER,
        }
    }
}

/// Stateless "ask for structured fields" capability.
///
/// Implementations return whatever output fields they could produce; callers
/// substitute documented defaults for anything missing.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn invoke(&self, role: Role, inputs: &Fields) -> Result<Fields>;
}

/// Build a `Fields` map from `(name, value)` pairs
pub fn fields<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Fields
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
