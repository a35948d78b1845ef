// crates/quarry/src/error.rs
// Standardized error types for Quarry

use thiserror::Error;

/// Main error type for the Quarry library
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Result using QuarryError
pub type Result<T> = std::result::Result<T, QuarryError>;
