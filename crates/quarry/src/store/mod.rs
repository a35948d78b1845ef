// crates/quarry/src/store/mod.rs
// Relational query store: execution and schema introspection

mod pool;
mod sqlite;

pub use pool::DatabasePool;
pub use sqlite::{SqliteStore, canonical_definition, execute_on};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Rows beyond this are never fetched
pub const MAX_ROWS: usize = 500;
/// Longest query text accepted, after trimming
pub const MAX_QUERY_CHARS: usize = 5000;
/// Store error messages are cut to this many characters
pub const MAX_ERROR_CHARS: usize = 200;

/// Rejection tag for blank query text
pub const EMPTY_QUERY: &str = "empty_query";
/// Rejection tag for query text over [`MAX_QUERY_CHARS`]
pub const QUERY_TOO_LONG: &str = "query_too_long";

/// Outcome of one query: columns and rows, or an error message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }
}

/// One table or view as exposed to query generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    pub definition: String,
}

/// Query execution and schema introspection.
///
/// `execute` never fails: problems are reported through
/// [`QueryResult::error`]. `schema` returns an empty list when the schema
/// cannot be read.
#[async_trait]
pub trait QueryStore: Send + Sync {
    async fn execute(&self, sql: &str) -> QueryResult;

    async fn schema(&self) -> Vec<SchemaEntry>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result() {
        let result = QueryResult::failed(EMPTY_QUERY);
        assert_eq!(result.error.as_deref(), Some("empty_query"));
        assert!(!result.has_rows());
        assert!(result.columns.is_empty());
    }

    #[test]
    fn test_query_result_roundtrips_through_json() {
        let result = QueryResult {
            columns: vec!["n".into()],
            rows: vec![vec![serde_json::json!(3)]],
            error: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: QueryResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
