// crates/quarry/src/engine/mod.rs
// Orchestration engine: interpreter loop over the pipeline stages

pub mod answer;
pub mod graph;
pub mod repair;
pub mod sql_text;
mod state;

pub use graph::{Stage, next_stage};
pub use state::{Route, RunState};

use crate::config::DEFAULT_TOP_K;
use crate::error::Result;
use crate::reasoning::{Reasoner, Role, fields};
use crate::retrieval::Retriever;
use crate::store::QueryStore;
use crate::trace::{NullTraceSink, SnippetRef, TraceEvent, TraceSink};
use crate::utils::truncate_chars;
use answer::{MAX_EXPLANATION_CHARS, coerce_answer, format_default, render_docs, render_evidence};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

const DEFAULT_EXPLANATION: &str = "Generated from available data";

/// Drives one question at a time through the pipeline.
///
/// Collaborators and the rendered schema are shared read-only across runs;
/// each run owns its [`RunState`].
pub struct Engine {
    reasoner: Arc<dyn Reasoner>,
    retriever: Arc<dyn Retriever>,
    store: Arc<dyn QueryStore>,
    trace: Arc<dyn TraceSink>,
    top_k: usize,
    schema_text: OnceCell<String>,
}

impl Engine {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn QueryStore>,
    ) -> Self {
        Self {
            reasoner,
            retriever,
            store,
            trace: Arc::new(NullTraceSink),
            top_k: DEFAULT_TOP_K,
            schema_text: OnceCell::new(),
        }
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Schema as rendered for query generation, loaded once.
    ///
    /// An empty schema is not cached so a later run can retry.
    pub async fn schema_text(&self) -> String {
        if let Some(text) = self.schema_text.get() {
            return text.clone();
        }
        let entries = self.store.schema().await;
        let text = sql_text::render_schema(&entries);
        if entries.is_empty() {
            warn!("Query store reported an empty schema");
            return text;
        }
        self.schema_text.get_or_init(|| async { text }).await.clone()
    }

    /// Run a question to completion and return its terminal state.
    ///
    /// Only collaborator failures (e.g. the language model being
    /// unreachable) surface as errors.
    #[instrument(skip_all, fields(run_id = %state.run_id))]
    pub async fn run(&self, mut state: RunState) -> Result<RunState> {
        let mut stage = Stage::ENTRY;
        while stage != Stage::Done {
            debug!(stage = %stage, repair_count = state.repair_count, "Entering stage");
            self.step(stage, &mut state).await?;
            stage = next_stage(stage, &state);
        }

        info!(
            route = ?state.route,
            repairs = state.repair_count,
            confidence = ?state.confidence,
            "Run complete"
        );
        Ok(state)
    }

    async fn step(&self, stage: Stage, state: &mut RunState) -> Result<()> {
        match stage {
            Stage::Router => self.route(state).await?,
            Stage::Retriever => self.retrieve(state),
            Stage::Planner => self.plan(state).await?,
            Stage::QueryGen => self.generate_query(state).await?,
            Stage::QueryExec => self.execute_query(state).await,
            Stage::Synthesizer => self.synthesize(state).await?,
            Stage::Repair => self.repair(state),
            Stage::Done => {}
        }
        Ok(())
    }

    fn emit(&self, state: &RunState, event: TraceEvent) {
        self.trace.record(&state.run_id, event);
    }

    async fn route(&self, state: &mut RunState) -> Result<()> {
        let out = self
            .reasoner
            .invoke(Role::Router, &fields([("question", state.question.as_str())]))
            .await?;
        let route = Route::normalize(out.get("route").map_or("", String::as_str));
        state.route = Some(route);

        self.emit(
            state,
            TraceEvent::Router {
                question: state.question.clone(),
                route_selection: route.to_string(),
            },
        );
        Ok(())
    }

    fn retrieve(&self, state: &mut RunState) {
        state.retrieved_docs = self.retriever.search(&state.question, self.top_k);
        debug!(docs = state.retrieved_docs.len(), "Retrieved fragments");

        self.emit(
            state,
            TraceEvent::Retriever {
                question: state.question.clone(),
                received_snippets: state
                    .retrieved_docs
                    .iter()
                    .map(|d| SnippetRef {
                        id: d.id.clone(),
                        score: d.score,
                    })
                    .collect(),
            },
        );
    }

    async fn plan(&self, state: &mut RunState) -> Result<()> {
        let docs = render_docs(&state.retrieved_docs);
        let out = self
            .reasoner
            .invoke(
                Role::Planner,
                &fields([("question", state.question.as_str()), ("docs", docs.as_str())]),
            )
            .await?;

        state.extracted_constraints = match out.get("constraints") {
            Some(raw) => parse_constraints(raw),
            None => Map::new(),
        };

        self.emit(
            state,
            TraceEvent::Planner {
                constraints: Value::Object(state.extracted_constraints.clone()),
            },
        );
        Ok(())
    }

    async fn generate_query(&self, state: &mut RunState) -> Result<()> {
        let schema = self.schema_text().await;
        let constraints = Value::Object(state.extracted_constraints.clone()).to_string();
        let out = self
            .reasoner
            .invoke(
                Role::QueryGen,
                &fields([
                    ("question", state.question.as_str()),
                    ("schema", schema.as_str()),
                    ("constraints", constraints.as_str()),
                ]),
            )
            .await?;
        state.sql = sql_text::finalize_sql(out.get("sql").map(String::as_str));

        self.emit(
            state,
            TraceEvent::Nl2sql {
                question: state.question.clone(),
                generated_sql: state.sql.clone(),
            },
        );
        Ok(())
    }

    async fn execute_query(&self, state: &mut RunState) {
        let result = self.store.execute(&state.sql).await;
        state.error = result.error.clone();

        self.emit(
            state,
            TraceEvent::Executor {
                sql: state.sql.clone(),
                sql_error: result.error.clone(),
                rows_returned: result.rows.len(),
            },
        );
        state.query_result = Some(result);
    }

    async fn synthesize(&self, state: &mut RunState) -> Result<()> {
        let evidence = render_evidence(state.query_result.as_ref(), &state.retrieved_docs);
        let hint = state.format_hint.to_string();
        let out = self
            .reasoner
            .invoke(
                Role::Synthesizer,
                &fields([
                    ("question", state.question.as_str()),
                    ("format_hint", hint.as_str()),
                    ("data", evidence.as_str()),
                ]),
            )
            .await?;

        let raw_answer = out
            .get("final_answer")
            .map(|a| Value::String(a.clone()))
            .unwrap_or_else(|| format_default(&state.format_hint));
        let has_rows = state.has_rows();
        let has_docs = state.has_docs();

        state.final_answer = Some(coerce_answer(&raw_answer, &state.format_hint));
        state.explanation = truncate_chars(
            out.get("explanation")
                .map_or(DEFAULT_EXPLANATION, String::as_str)
                .trim(),
            MAX_EXPLANATION_CHARS,
        );
        state.citations = answer::resolve_citations(
            out.get("citations").map(String::as_str),
            &state.retrieved_docs,
            has_rows,
        );
        state.confidence = Some(answer::score_confidence(
            has_rows,
            has_docs,
            state.repair_count,
        ));

        self.emit(
            state,
            TraceEvent::Synthesizer {
                format_hint: hint,
                final_output: state.final_answer.clone().unwrap_or(Value::Null),
                confidence: state.confidence.unwrap_or(answer::MIN_CONFIDENCE),
                citations: state.citations.clone(),
            },
        );
        Ok(())
    }

    fn repair(&self, state: &mut RunState) {
        repair::repair(state);
        if repair::budget_exhausted(state) {
            warn!(repairs = state.repair_count, "Repair budget exhausted; accepting current answer");
        } else {
            debug!(repairs = state.repair_count, error = ?state.error, "Repair pass");
        }

        self.emit(
            state,
            TraceEvent::Repair {
                repair_count: state.repair_count,
                error: state.error.clone(),
                confidence: state.confidence,
            },
        );
    }
}

/// Constraint object from model output; anything else is an empty map
fn parse_constraints(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            debug!("Constraints were not a JSON object; using none");
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constraints_object() {
        let map = parse_constraints(r#" {"date_range": ["1997-06-01", "1997-06-30"]} "#);
        assert_eq!(map["date_range"][0], "1997-06-01");
    }

    #[test]
    fn test_parse_constraints_fallbacks() {
        assert!(parse_constraints("not json").is_empty());
        assert!(parse_constraints("[1, 2]").is_empty());
        assert!(parse_constraints("").is_empty());
    }
}
