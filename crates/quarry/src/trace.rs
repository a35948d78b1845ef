// crates/quarry/src/trace.rs
// Append-only JSONL audit of pipeline stages (best effort, never fails a run)

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Document id and score as seen by the retriever stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnippetRef {
    pub id: String,
    pub score: f32,
}

/// Stage-specific payload of one trace line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TraceEvent {
    Router {
        question: String,
        route_selection: String,
    },
    Retriever {
        question: String,
        received_snippets: Vec<SnippetRef>,
    },
    Planner {
        constraints: Value,
    },
    Nl2sql {
        question: String,
        generated_sql: String,
    },
    Executor {
        sql: String,
        sql_error: Option<String>,
        rows_returned: usize,
    },
    Synthesizer {
        format_hint: String,
        final_output: Value,
        confidence: f64,
        citations: Vec<String>,
    },
    Repair {
        repair_count: u32,
        error: Option<String>,
        confidence: Option<f64>,
    },
}

impl TraceEvent {
    pub fn step(&self) -> &'static str {
        match self {
            Self::Router { .. } => "router",
            Self::Retriever { .. } => "retriever",
            Self::Planner { .. } => "planner",
            Self::Nl2sql { .. } => "nl2sql",
            Self::Executor { .. } => "executor",
            Self::Synthesizer { .. } => "synthesizer",
            Self::Repair { .. } => "repair",
        }
    }
}

/// One line of the trace file
#[derive(Debug, Serialize)]
struct TraceLine<'a> {
    run_id: &'a str,
    /// Seconds since the Unix epoch
    timestamp: f64,
    #[serde(flatten)]
    event: &'a TraceEvent,
}

/// Fire-and-forget sink for stage events.
///
/// Implementations swallow their own failures.
pub trait TraceSink: Send + Sync {
    fn record(&self, run_id: &str, event: TraceEvent);
}

/// Appends one JSON object per event to a file
pub struct JsonlTraceSink {
    path: PathBuf,
}

impl JsonlTraceSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, run_id: &str, event: &TraceEvent) -> anyhow::Result<()> {
        let line = TraceLine {
            run_id,
            timestamp: Utc::now().timestamp_micros() as f64 / 1_000_000.0,
            event,
        };
        let mut json = serde_json::to_string(&line)?;
        json.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, run_id: &str, event: TraceEvent) {
        if let Err(e) = self.append(run_id, &event) {
            debug!(path = %self.path.display(), step = event.step(), error = %e, "Trace write failed");
        }
    }
}

/// Discards every event
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&self, _run_id: &str, _event: TraceEvent) {}
}
