// crates/quarry/src/retrieval/mod.rs
// Lexical document retrieval over a local text corpus

mod corpus;
mod stopwords;
mod tfidf;

pub use corpus::{Chunk, chunk_text, load_corpus};
pub use tfidf::TfidfRetriever;

use quarry_types::Fragment;

/// Fragments scoring at or below this are never returned
pub const RELEVANCE_FLOOR: f32 = 0.01;
/// Maximum characters of fragment content handed to callers
pub const MAX_FRAGMENT_CHARS: usize = 500;

/// Ranked search over document fragments.
///
/// Results are sorted by descending score and exclude anything at or below
/// [`RELEVANCE_FLOOR`]. An empty query yields no results, and internal
/// failures yield an empty list rather than an error.
pub trait Retriever: Send + Sync {
    fn search(&self, query: &str, top_k: usize) -> Vec<Fragment>;
}
