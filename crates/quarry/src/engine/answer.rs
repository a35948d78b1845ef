// crates/quarry/src/engine/answer.rs
// Deterministic answer post-processing: coercion, confidence, citations

use crate::store::QueryResult;
use crate::utils::{dedup_preserving_order, round_to};
use quarry_types::{FormatHint, Fragment};
use serde_json::{Map, Value, json};

pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;
const BASE_CONFIDENCE: f64 = 0.5;
const ROWS_BONUS: f64 = 0.3;
const DOCS_BONUS: f64 = 0.2;
/// Per-repair geometric decay
const REPAIR_DECAY: f64 = 0.9;
/// Multiplier applied when the repair budget is exhausted
pub const FORCE_ACCEPT_PENALTY: f64 = 0.3;

/// Explanations are cut to this many characters
pub const MAX_EXPLANATION_CHARS: usize = 200;
/// Query rows shown to the synthesizer
const EVIDENCE_ROWS: usize = 5;

/// Tables cited when query rows back an answer but the model gave no sources
pub const CANONICAL_TABLES: &[&str] = &["Orders", "Order Details", "Products", "Customers"];

// ═══════════════════════════════════════
// FORMAT COERCION
// ═══════════════════════════════════════

/// Value used when an answer cannot be produced in the requested shape
pub fn format_default(hint: &FormatHint) -> Value {
    match hint {
        FormatHint::Int => json!(0),
        FormatHint::Float => json!(0.0),
        FormatHint::List(_) => json!([]),
        FormatHint::Object(_) => json!({}),
        FormatHint::Text(_) => json!("Error"),
    }
}

fn answer_text(answer: &Value) -> String {
    match answer {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn try_coerce(answer: &Value, hint: &FormatHint) -> Option<Value> {
    let text = answer_text(answer);
    match hint {
        FormatHint::Int => {
            let number = parse_number(&text)?.trunc();
            // Casts saturate; u64 covers the positive range past i64
            if number >= i64::MAX as f64 && number < u64::MAX as f64 {
                return Some(Value::from(number as u64));
            }
            Some(Value::from(number as i64))
        }
        FormatHint::Float => {
            serde_json::Number::from_f64(round_to(parse_number(&text)?, 2)).map(Value::Number)
        }
        FormatHint::List(_) => Some(match answer {
            Value::Array(_) => answer.clone(),
            _ => serde_json::from_str(&text).unwrap_or_else(|_| json!([text])),
        }),
        FormatHint::Object(_) => Some(match answer {
            Value::Object(_) => answer.clone(),
            _ => serde_json::from_str(&text).unwrap_or_else(|_| json!({ "result": text })),
        }),
        FormatHint::Text(_) => Some(Value::String(text)),
    }
}

/// Coerce an answer to the shape `hint` asks for.
///
/// Total: anything that cannot be coerced yields [`format_default`].
/// JSON that decodes to the wrong kind is passed through so that format
/// validation can flag it.
pub fn coerce_answer(answer: &Value, hint: &FormatHint) -> Value {
    try_coerce(answer, hint).unwrap_or_else(|| format_default(hint))
}

/// Kind name reported in format-validation failures
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn is_integer_like(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => is_digit_text(&n.to_string()),
        Value::String(s) => is_digit_text(s),
        _ => false,
    }
}

/// Digits once any `.` and `-` are removed
fn is_digit_text(text: &str) -> bool {
    let digits: String = text.chars().filter(|c| *c != '.' && *c != '-').collect();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Whether `answer` already has the shape `hint` asks for
pub fn matches_format(answer: &Value, hint: &FormatHint) -> bool {
    match hint {
        FormatHint::Int => is_integer_like(answer),
        FormatHint::Float => match answer {
            Value::Number(_) => true,
            Value::String(s) => parse_number(s).is_some(),
            _ => false,
        },
        FormatHint::List(_) => answer.is_array(),
        FormatHint::Object(_) => answer.is_object(),
        FormatHint::Text(_) => true,
    }
}

// ═══════════════════════════════════════
// CONFIDENCE
// ═══════════════════════════════════════

pub fn clamp_confidence(confidence: f64) -> f64 {
    confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Apply `0.9^repair_count` decay, clamped
pub fn decay_confidence(confidence: f64, repair_count: u32) -> f64 {
    clamp_confidence(confidence * REPAIR_DECAY.powi(repair_count as i32))
}

/// Evidence-based score: 0.5, +0.3 with query rows, +0.2 with documents
pub fn score_confidence(has_rows: bool, has_docs: bool, repair_count: u32) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if has_rows {
        confidence += ROWS_BONUS;
    }
    if has_docs {
        confidence += DOCS_BONUS;
    }
    decay_confidence(confidence, repair_count)
}

// ═══════════════════════════════════════
// CITATIONS
// ═══════════════════════════════════════

/// Parse the model's citation list; `None` when it is blank, not JSON, or empty
fn parse_citations(raw: &str) -> Option<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let citations: Vec<String> = match serde_json::from_str::<Value>(raw).ok()? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Value::String(s) => vec![s],
        _ => return None,
    };
    (!citations.is_empty()).then_some(citations)
}

/// Sources derived from the evidence itself
pub fn fallback_citations(docs: &[Fragment], has_rows: bool) -> Vec<String> {
    let mut citations: Vec<String> = docs
        .iter()
        .map(|d| d.id.clone())
        .filter(|id| !id.is_empty())
        .collect();
    if has_rows {
        citations.extend(CANONICAL_TABLES.iter().map(|t| t.to_string()));
    }
    dedup_preserving_order(citations)
}

/// Model citations when usable, otherwise evidence-derived ones
pub fn resolve_citations(raw: Option<&str>, docs: &[Fragment], has_rows: bool) -> Vec<String> {
    match raw.and_then(parse_citations) {
        Some(citations) => dedup_preserving_order(citations),
        None => fallback_citations(docs, has_rows),
    }
}

// ═══════════════════════════════════════
// EVIDENCE
// ═══════════════════════════════════════

/// `"<id>: <content>"` per fragment, newline-joined
pub fn render_docs(docs: &[Fragment]) -> String {
    docs.iter()
        .map(|d| format!("{}: {}", d.id, d.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Query rows when there are any, else documents, else nothing
pub fn render_evidence(result: Option<&QueryResult>, docs: &[Fragment]) -> String {
    match result {
        Some(result) if result.has_rows() => {
            let mut evidence = Map::new();
            evidence.insert("columns".into(), json!(result.columns));
            let rows: Vec<&Vec<Value>> = result.rows.iter().take(EVIDENCE_ROWS).collect();
            evidence.insert("rows".into(), json!(rows));
            Value::Object(evidence).to_string()
        }
        _ if !docs.is_empty() => render_docs(docs),
        _ => String::new(),
    }
}
