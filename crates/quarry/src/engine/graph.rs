// crates/quarry/src/engine/graph.rs
// Pipeline stages and the pure transition guards between them

use super::repair::{budget_exhausted, detect_failure, is_query_failure};
use super::state::{Route, RunState};

/// One node of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Router,
    Retriever,
    Planner,
    QueryGen,
    QueryExec,
    Synthesizer,
    Repair,
    Done,
}

impl Stage {
    pub const ENTRY: Stage = Stage::Router;

    /// Every stage this one may hand over to
    pub fn successors(self) -> &'static [Stage] {
        match self {
            Stage::Router => &[Stage::Retriever, Stage::Planner],
            Stage::Retriever => &[Stage::Planner, Stage::Synthesizer],
            Stage::Planner => &[Stage::QueryGen, Stage::Synthesizer],
            Stage::QueryGen => &[Stage::QueryExec],
            Stage::QueryExec => &[Stage::Synthesizer],
            Stage::Synthesizer => &[Stage::Repair, Stage::Done],
            Stage::Repair => &[Stage::QueryGen, Stage::Synthesizer, Stage::Done],
            Stage::Done => &[],
        }
    }
}

fn route(state: &RunState) -> Route {
    state.route.unwrap_or(Route::Hybrid)
}

/// Pick the stage after `current`. Reads the state, never changes it.
///
/// After synthesis any detected failure goes to repair, whatever the repair
/// count. The bound lives on the repair edge instead: a run gets at most
/// `MAX_REPAIRS + 1` synthesis passes, and the repair after the last one
/// force-accepts the answer and ends the run.
pub fn next_stage(current: Stage, state: &RunState) -> Stage {
    match current {
        Stage::Router if route(state).uses_documents() => Stage::Retriever,
        Stage::Router => Stage::Planner,
        Stage::Retriever if route(state).uses_data() => Stage::Planner,
        Stage::Retriever => Stage::Synthesizer,
        Stage::Planner if route(state).uses_data() => Stage::QueryGen,
        Stage::Planner => Stage::Synthesizer,
        Stage::QueryGen => Stage::QueryExec,
        Stage::QueryExec => Stage::Synthesizer,
        Stage::Synthesizer if detect_failure(state).is_some() => Stage::Repair,
        Stage::Synthesizer => Stage::Done,
        Stage::Repair if budget_exhausted(state) => Stage::Done,
        Stage::Repair => match state.error.as_deref() {
            Some(tag) if is_query_failure(tag) => Stage::QueryGen,
            // Format and unclassified failures both get another synthesis
            _ => Stage::Synthesizer,
        },
        Stage::Done => Stage::Done,
    }
}
