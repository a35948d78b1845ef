// crates/quarry/src/batch/mod.rs
// Batch driver: JSONL questions in, one answer record per question out

mod checkpoint;

pub use checkpoint::CheckpointStore;

use crate::engine::answer::{MIN_CONFIDENCE, coerce_answer, format_default};
use crate::engine::{Engine, RunState};
use crate::error::{QuarryError, Result};
use crate::utils::{round_to, truncate_chars};
use futures::FutureExt;
use quarry_types::{AnswerRecord, BatchItem};
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tracing::{error, info, warn};

/// Explanations longer than this are cut back to their first sentences
const MAX_EXPLANATION_CHARS: usize = 200;
const EXPLANATION_SENTENCES: usize = 2;
/// Characters of an error message kept in a fallback explanation
const FALLBACK_ERROR_CHARS: usize = 100;

/// Run id for a batch question
pub fn run_id_for(id: &str) -> String {
    format!("thread_{}", id)
}

/// Parse JSONL batch input.
///
/// Blank lines are skipped silently, malformed lines with a warning.
pub fn parse_batch(input: &str) -> Vec<BatchItem> {
    let mut items = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<BatchItem>(line) {
            Ok(item) => items.push(item),
            Err(e) => warn!(line = idx + 1, error = %e, "Skipping malformed batch line"),
        }
    }
    items
}

pub fn read_batch(path: &Path) -> Result<Vec<BatchItem>> {
    let input = std::fs::read_to_string(path).map_err(|e| {
        QuarryError::InvalidInput(format!("cannot read batch {}: {}", path.display(), e))
    })?;
    Ok(parse_batch(&input))
}

/// Long explanations keep only their first two sentences, still capped
/// at `MAX_EXPLANATION_CHARS` when a sentence runs on
pub fn shape_explanation(text: &str) -> String {
    if text.chars().count() <= MAX_EXPLANATION_CHARS {
        return text.to_string();
    }
    let shaped = text
        .split(". ")
        .take(EXPLANATION_SENTENCES)
        .collect::<Vec<_>>()
        .join(". ");
    if shaped.ends_with('.') && shaped.chars().count() <= MAX_EXPLANATION_CHARS {
        return shaped;
    }
    let mut shaped = truncate_chars(shaped.trim_end_matches('.'), MAX_EXPLANATION_CHARS - 1);
    shaped.push('.');
    shaped
}

/// Output record for a finished run
pub fn to_record(id: &str, state: &RunState) -> AnswerRecord {
    let answer = state
        .final_answer
        .clone()
        .unwrap_or_else(|| format_default(&state.format_hint));

    AnswerRecord {
        id: id.to_string(),
        final_answer: coerce_answer(&answer, &state.format_hint),
        sql: state.sql.clone(),
        confidence: round_to(state.confidence.unwrap_or(MIN_CONFIDENCE), 2),
        explanation: shape_explanation(&state.explanation),
        citations: state.citations.clone(),
    }
}

/// Record emitted when a question could not be answered at all
pub fn fallback_record(item: &BatchItem, error: &str) -> AnswerRecord {
    AnswerRecord {
        id: item.id.clone(),
        final_answer: format_default(&item.format_hint),
        sql: String::new(),
        confidence: MIN_CONFIDENCE,
        explanation: format!(
            "Error processing question: {}",
            truncate_chars(error, FALLBACK_ERROR_CHARS)
        ),
        citations: Vec::new(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "run panicked".to_string())
}

/// Options for a batch run
#[derive(Default)]
pub struct BatchOptions {
    pub checkpoints: Option<CheckpointStore>,
    /// Skip questions whose checkpoint already exists
    pub resume: bool,
}

/// Counts reported once a batch finishes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub answered: usize,
    pub failed: usize,
    pub resumed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.answered + self.failed + self.resumed
    }
}

enum Outcome {
    Answered(AnswerRecord),
    Resumed(AnswerRecord),
    Failed(AnswerRecord),
}

/// Drives questions through an engine, never letting one question abort the rest
pub struct BatchRunner<'a> {
    engine: &'a Engine,
    options: BatchOptions,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engine: &'a Engine, options: BatchOptions) -> Self {
        Self { engine, options }
    }

    /// Answer one question; failures become a fallback record
    pub async fn answer(&self, item: &BatchItem) -> AnswerRecord {
        match self.process(item).await {
            Outcome::Answered(r) | Outcome::Resumed(r) | Outcome::Failed(r) => r,
        }
    }

    async fn process(&self, item: &BatchItem) -> Outcome {
        let run_id = run_id_for(&item.id);

        if self.options.resume
            && let Some(store) = &self.options.checkpoints
            && let Some(state) = store.load(&run_id)
        {
            info!(id = %item.id, "Resuming from checkpoint");
            return Outcome::Resumed(to_record(&item.id, &state));
        }

        let state = RunState::new(run_id, item.question.clone(), item.format_hint.clone());
        let run = AssertUnwindSafe(self.engine.run(state)).catch_unwind().await;

        let error = match run {
            Ok(Ok(state)) => {
                if let Some(store) = &self.options.checkpoints
                    && let Err(e) = store.save(&state)
                {
                    warn!(id = %item.id, error = %e, "Failed to write checkpoint");
                }
                return Outcome::Answered(to_record(&item.id, &state));
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        error!(id = %item.id, error = %error, "Question failed; emitting fallback record");
        Outcome::Failed(fallback_record(item, &error))
    }

    /// Answer every item in order
    pub async fn run(&self, items: &[BatchItem]) -> (Vec<AnswerRecord>, BatchSummary) {
        let mut records = Vec::with_capacity(items.len());
        let mut summary = BatchSummary::default();

        for (idx, item) in items.iter().enumerate() {
            info!(id = %item.id, n = idx + 1, of = items.len(), "Processing question");
            let record = match self.process(item).await {
                Outcome::Answered(r) => {
                    summary.answered += 1;
                    r
                }
                Outcome::Resumed(r) => {
                    summary.resumed += 1;
                    r
                }
                Outcome::Failed(r) => {
                    summary.failed += 1;
                    r
                }
            };
            records.push(record);
        }

        (records, summary)
    }

    /// Read `input`, answer every question and write `output`
    pub async fn run_files(&self, input: &Path, output: &Path) -> Result<BatchSummary> {
        let items = read_batch(input)?;
        info!(questions = items.len(), input = %input.display(), "Batch loaded");

        let (records, summary) = self.run(&items).await;
        write_records(output, &records)?;

        info!(
            total = summary.total(),
            answered = summary.answered,
            resumed = summary.resumed,
            failed = summary.failed,
            output = %output.display(),
            "Batch complete"
        );
        Ok(summary)
    }
}

/// Write records as JSONL, creating parent directories as needed
pub fn write_records(path: &Path, records: &[AnswerRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
