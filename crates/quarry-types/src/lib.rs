// crates/quarry-types/src/lib.rs
// Shared wire types for Quarry batch records
// No native-only dependencies allowed here

use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════
// ANSWER SHAPE
// ═══════════════════════════════════════

/// Caller-supplied tag constraining the shape of a final answer.
///
/// Parametric forms keep their original text (`list[str]`,
/// `{customer:str, value:float}`) so it can be echoed back in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormatHint {
    Int,
    Float,
    /// `list` or `list[...]`
    List(String),
    /// `object` or `{...}`
    Object(String),
    /// Anything else: the answer is passed through as text
    Text(String),
}

impl FormatHint {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "int" => Self::Int,
            "float" => Self::Float,
            "list" => Self::List(raw.to_string()),
            "object" => Self::Object(raw.to_string()),
            _ if raw.starts_with("list[") => Self::List(raw.to_string()),
            _ if raw.starts_with('{') => Self::Object(raw.to_string()),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// The tag as the caller wrote it
    pub fn as_str(&self) -> &str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::List(raw) | Self::Object(raw) | Self::Text(raw) => raw,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

impl Default for FormatHint {
    fn default() -> Self {
        Self::Text("str".to_string())
    }
}

impl From<String> for FormatHint {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<FormatHint> for String {
    fn from(hint: FormatHint) -> Self {
        hint.as_str().to_string()
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════
// RETRIEVAL
// ═══════════════════════════════════════

/// Scored excerpt of a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub content: String,
    pub score: f32,
}

// ═══════════════════════════════════════
// BATCH RECORDS
// ═══════════════════════════════════════

/// One line of batch input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub format_hint: FormatHint,
}

/// One line of batch output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: String,
    pub final_answer: serde_json::Value,
    pub sql: String,
    pub confidence: f64,
    pub explanation: String,
    pub citations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hint_parse() {
        assert_eq!(FormatHint::parse("int"), FormatHint::Int);
        assert_eq!(FormatHint::parse(" float "), FormatHint::Float);
        assert_eq!(FormatHint::parse("list"), FormatHint::List("list".into()));
        assert_eq!(
            FormatHint::parse("list[str]"),
            FormatHint::List("list[str]".into())
        );
        assert_eq!(
            FormatHint::parse("{customer:str, value:float}"),
            FormatHint::Object("{customer:str, value:float}".into())
        );
        assert_eq!(FormatHint::parse("str"), FormatHint::Text("str".into()));
    }

    #[test]
    fn test_format_hint_keeps_original_text() {
        let hint = FormatHint::parse("list[{product:str}]");
        assert_eq!(hint.as_str(), "list[{product:str}]");
        assert_eq!(hint.to_string(), "list[{product:str}]");
        assert!(hint.is_list());
    }

    #[test]
    fn test_batch_item_defaults() {
        let item: BatchItem = serde_json::from_str(r#"{"question": "How many?"}"#).unwrap();
        assert_eq!(item.id, "");
        assert_eq!(item.question, "How many?");
        assert_eq!(item.format_hint, FormatHint::Text("str".into()));
    }

    #[test]
    fn test_batch_item_hint_deserializes_from_string() {
        let item: BatchItem =
            serde_json::from_str(r#"{"id": "q1", "question": "q", "format_hint": "int"}"#)
                .unwrap();
        assert_eq!(item.format_hint, FormatHint::Int);
    }

    #[test]
    fn test_answer_record_serializes_flat() {
        let record = AnswerRecord {
            id: "q1".into(),
            final_answer: serde_json::json!(14),
            sql: "SELECT 14".into(),
            confidence: 0.8,
            explanation: "Counted rows.".into(),
            citations: vec!["Orders".into()],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["final_answer"], 14);
        assert_eq!(value["citations"][0], "Orders");
    }
}
