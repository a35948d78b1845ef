// crates/quarry/src/engine/state.rs
// Per-question run state shared by every pipeline stage

use crate::store::QueryResult;
use quarry_types::{FormatHint, Fragment};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which knowledge sources a question needs
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Route {
    /// Documents only
    Rag,
    /// Structured data only
    Sql,
    /// Both
    Hybrid,
}

impl Route {
    /// Normalise classifier output; anything unrecognised becomes `Hybrid`
    pub fn normalize(raw: &str) -> Self {
        raw.trim().to_lowercase().parse().unwrap_or(Self::Hybrid)
    }

    pub fn uses_documents(self) -> bool {
        matches!(self, Self::Rag | Self::Hybrid)
    }

    pub fn uses_data(self) -> bool {
        matches!(self, Self::Sql | Self::Hybrid)
    }
}

/// Mutable record for one question, owned by one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Caller-supplied id for trace correlation and checkpoints
    pub run_id: String,
    pub question: String,
    pub format_hint: FormatHint,
    /// `None` until the router has run
    pub route: Option<Route>,
    pub retrieved_docs: Vec<Fragment>,
    pub extracted_constraints: Map<String, Value>,
    pub sql: String,
    pub query_result: Option<QueryResult>,
    pub final_answer: Option<Value>,
    /// Always within [0.1, 1.0] once set
    pub confidence: Option<f64>,
    pub explanation: String,
    pub citations: Vec<String>,
    pub error: Option<String>,
    pub repair_count: u32,
}

impl RunState {
    pub fn new(
        run_id: impl Into<String>,
        question: impl Into<String>,
        format_hint: FormatHint,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            question: question.into(),
            format_hint,
            route: None,
            retrieved_docs: Vec::new(),
            extracted_constraints: Map::new(),
            sql: String::new(),
            query_result: None,
            final_answer: None,
            confidence: None,
            explanation: String::new(),
            citations: Vec::new(),
            error: None,
            repair_count: 0,
        }
    }

    pub fn has_rows(&self) -> bool {
        self.query_result.as_ref().is_some_and(QueryResult::has_rows)
    }

    pub fn has_docs(&self) -> bool {
        !self.retrieved_docs.is_empty()
    }
}
