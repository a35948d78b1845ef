// crates/quarry/src/engine/repair.rs
// Failure classification and the bounded repair step

use super::answer::{FORCE_ACCEPT_PENALTY, clamp_confidence, decay_confidence, matches_format, value_kind};
use super::state::RunState;
use serde_json::Value;

/// Repair passes allowed before the current answer is force-accepted
pub const MAX_REPAIRS: u32 = 2;

/// Prefix shared by every query-failure tag
pub const QUERY_FAILURE_PREFIX: &str = "sql_";
pub const FORMAT_FAILURE: &str = "format_validation_failed";

/// Store error substrings, checked in order
const QUERY_FAILURE_KINDS: &[(&str, &str)] = &[
    ("syntax error", "sql_syntax_error"),
    ("no such table", "sql_table_error"),
    ("no such column", "sql_column_error"),
];
const QUERY_FAILURE_FALLBACK: &str = "sql_execution_error";

/// Tag the store error from the last execution, if any
pub fn classify_query_failure(state: &RunState) -> Option<String> {
    let error = state.query_result.as_ref()?.error.as_deref()?;
    let lower = error.to_lowercase();
    let kind = QUERY_FAILURE_KINDS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map_or(QUERY_FAILURE_FALLBACK, |(_, kind)| *kind);
    Some(format!("{}: {}", kind, error))
}

/// Tag an answer whose shape does not match the format hint
pub fn classify_format_failure(state: &RunState) -> Option<String> {
    let answer = state.final_answer.as_ref().unwrap_or(&Value::Null);
    if matches_format(answer, &state.format_hint) {
        return None;
    }
    Some(format!(
        "{}: expected {}, got {}",
        FORMAT_FAILURE,
        state.format_hint,
        value_kind(answer)
    ))
}

/// Current failure, query problems first; recomputed on every call
pub fn detect_failure(state: &RunState) -> Option<String> {
    classify_query_failure(state).or_else(|| classify_format_failure(state))
}

/// Whether a failure tag belongs to the query family
pub fn is_query_failure(tag: &str) -> bool {
    tag.starts_with(QUERY_FAILURE_PREFIX)
}

/// Whether the repair budget is spent and the answer was force-accepted
pub fn budget_exhausted(state: &RunState) -> bool {
    state.repair_count > MAX_REPAIRS
}

/// One pass through the repair state.
///
/// Past the budget the current answer is accepted at reduced confidence.
/// Otherwise the failure is re-detected: a resolved run has its error
/// cleared and confidence decayed, an unresolved one carries the fresh tag
/// forward for routing.
pub fn repair(state: &mut RunState) {
    state.repair_count += 1;

    if budget_exhausted(state) {
        state.confidence = Some(clamp_confidence(
            state.confidence.unwrap_or(0.5) * FORCE_ACCEPT_PENALTY,
        ));
        state.error = None;
        return;
    }

    match detect_failure(state) {
        Some(tag) => state.error = Some(tag),
        None => {
            state.error = None;
            state.confidence = Some(decay_confidence(
                state.confidence.unwrap_or(0.5),
                state.repair_count,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::QueryResult;
    use quarry_types::FormatHint;
    use serde_json::json;

    fn state_with_error(error: &str) -> RunState {
        let mut state = RunState::new("r", "q", FormatHint::Int);
        state.query_result = Some(QueryResult::failed(error));
        state.final_answer = Some(json!(0));
        state
    }

    // ============================================================================
    // Classification
    // ============================================================================

    #[test]
    fn test_query_failure_kinds() {
        let cases = [
            ("near \"SELEC\": syntax error", "sql_syntax_error"),
            ("no such table: Nope", "sql_table_error"),
            ("No Such Column: Bogus", "sql_column_error"),
            ("database is locked", "sql_execution_error"),
            ("empty_query", "sql_execution_error"),
        ];
        for (error, kind) in cases {
            let tag = classify_query_failure(&state_with_error(error)).unwrap();
            assert_eq!(tag, format!("{kind}: {error}"));
            assert!(is_query_failure(&tag));
        }
    }

    #[test]
    fn test_syntax_error_wins_over_table() {
        let tag = classify_query_failure(&state_with_error("syntax error near no such table")).unwrap();
        assert!(tag.starts_with("sql_syntax_error"));
    }

    #[test]
    fn test_no_query_no_failure() {
        let mut state = RunState::new("r", "q", FormatHint::Int);
        state.final_answer = Some(json!(3));
        assert!(classify_query_failure(&state).is_none());
        state.query_result = Some(QueryResult::default());
        assert!(detect_failure(&state).is_none());
    }

    #[test]
    fn test_format_failure_tag() {
        let mut state = RunState::new("r", "q", FormatHint::parse("list[str]"));
        state.final_answer = Some(json!("Chai"));
        let tag = classify_format_failure(&state).unwrap();
        assert_eq!(tag, "format_validation_failed: expected list[str], got str");
        assert!(!is_query_failure(&tag));
    }

    #[test]
    fn test_missing_answer_fails_strict_formats_only() {
        let state = RunState::new("r", "q", FormatHint::Float);
        assert!(classify_format_failure(&state).unwrap().ends_with("got null"));
        let text = RunState::new("r", "q", FormatHint::default());
        assert!(classify_format_failure(&text).is_none());
    }

    #[test]
    fn test_query_failure_takes_priority() {
        let mut state = state_with_error("no such column: X");
        state.final_answer = Some(json!("oops"));
        assert!(detect_failure(&state).unwrap().starts_with("sql_column_error"));
    }

    // ============================================================================
    // Repair step
    // ============================================================================

    #[test]
    fn test_repair_records_tag_for_routing() {
        let mut state = state_with_error("no such column: Bogus");
        state.error = Some("no such column: Bogus".into());
        state.confidence = Some(0.5);
        repair(&mut state);
        assert_eq!(state.repair_count, 1);
        assert_eq!(state.error.as_deref(), Some("sql_column_error: no such column: Bogus"));
        assert_eq!(state.confidence, Some(0.5));
    }

    #[test]
    fn test_repair_recovered_decays_confidence() {
        let mut state = RunState::new("r", "q", FormatHint::Int);
        state.final_answer = Some(json!(4));
        state.confidence = Some(0.8);
        state.error = Some("stale".into());
        repair(&mut state);
        assert!(state.error.is_none());
        assert!((state.confidence.unwrap() - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_repair_force_accepts_past_budget() {
        let mut state = state_with_error("no such table: T");
        state.repair_count = MAX_REPAIRS;
        state.confidence = Some(0.5);
        repair(&mut state);
        assert_eq!(state.repair_count, 3);
        assert!(budget_exhausted(&state));
        assert!(state.error.is_none());
        assert!((state.confidence.unwrap() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_force_accept_clamps_to_floor() {
        let mut state = state_with_error("x");
        state.repair_count = MAX_REPAIRS;
        state.confidence = Some(0.2);
        repair(&mut state);
        assert_eq!(state.confidence, Some(0.1));
    }
}
