// crates/quarry/src/retrieval/tfidf.rs
// TF-IDF index over document chunks with cosine-similarity search

use super::corpus::{Chunk, load_corpus};
use super::stopwords::is_stop_word;
use super::{MAX_FRAGMENT_CHARS, RELEVANCE_FLOOR, Retriever};
use crate::error::{QuarryError, Result};
use crate::utils::truncate_chars;
use quarry_types::Fragment;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Words of two or more word characters
#[allow(clippy::expect_used)]
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

/// Terms appearing in more than this share of chunks are dropped
const MAX_DOC_FREQ: f32 = 0.95;
/// Vocabulary cap, keeping the most frequent terms across the corpus
const MAX_FEATURES: usize = 2000;

/// Sparse L2-normalised vector: (term index, weight), sorted by index
type SparseVec = Vec<(usize, f32)>;

/// Lower-cased unigrams and bigrams after stop-word removal
fn analyze(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| !is_stop_word(w))
        .collect();

    let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

fn term_counts(terms: &[String]) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for term in terms {
        *counts.entry(term.as_str()).or_insert(0) += 1;
    }
    counts
}

/// In-memory lexical retriever built once from a docs directory
pub struct TfidfRetriever {
    chunks: Vec<Chunk>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    vectors: Vec<SparseVec>,
}

impl TfidfRetriever {
    /// Load and index every document under `docs_path`
    pub fn open(docs_path: &Path, chunk_size: usize) -> Result<Self> {
        let chunks = load_corpus(docs_path, chunk_size)?;
        if chunks.is_empty() {
            return Err(QuarryError::Retrieval(format!(
                "no text files found in {}",
                docs_path.display()
            )));
        }
        let retriever = Self::from_chunks(chunks);
        info!(
            chunks = retriever.chunks.len(),
            vocabulary = retriever.vocabulary.len(),
            "Document index built"
        );
        Ok(retriever)
    }

    /// Fit the vectoriser on already-chunked documents
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let analyzed: Vec<Vec<String>> = chunks.iter().map(|c| analyze(&c.content)).collect();
        let n_docs = chunks.len();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut corpus_freq: HashMap<&str, u64> = HashMap::new();
        for terms in &analyzed {
            for (term, count) in term_counts(terms) {
                *doc_freq.entry(term).or_insert(0) += 1;
                *corpus_freq.entry(term).or_insert(0) += u64::from(count);
            }
        }

        let max_df = (MAX_DOC_FREQ * n_docs as f32).floor() as usize;
        let pruned: Vec<&str> = doc_freq
            .iter()
            .filter(|(_, df)| **df <= max_df)
            .map(|(term, _)| *term)
            .collect();
        let mut candidates = if pruned.is_empty() {
            debug!("Document-frequency pruning would empty the vocabulary; skipping it");
            doc_freq.keys().copied().collect()
        } else {
            pruned
        };

        // Most frequent first, alphabetical among ties
        candidates.sort_by(|a, b| corpus_freq[b].cmp(&corpus_freq[a]).then_with(|| a.cmp(b)));
        candidates.truncate(MAX_FEATURES);
        candidates.sort_unstable();

        let vocabulary: HashMap<String, usize> = candidates
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), idx))
            .collect();
        let idf: Vec<f32> = candidates
            .iter()
            .map(|term| {
                let df = doc_freq[term] as f32;
                ((1.0 + n_docs as f32) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let vectors = analyzed
            .iter()
            .map(|terms| vectorize(&vocabulary, &idf, terms))
            .collect();

        Self {
            chunks,
            vocabulary,
            idf,
            vectors,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Weight raw term counts by idf and L2-normalise
fn vectorize(vocabulary: &HashMap<String, usize>, idf: &[f32], terms: &[String]) -> SparseVec {
    let mut vector: SparseVec = term_counts(terms)
        .into_iter()
        .filter_map(|(term, count)| {
            vocabulary
                .get(term)
                .map(|&idx| (idx, count as f32 * idf[idx]))
        })
        .collect();
    vector.sort_unstable_by_key(|(idx, _)| *idx);

    let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in &mut vector {
            *w /= norm;
        }
    }
    vector
}

/// Dot product of two index-sorted sparse vectors
fn dot(a: &SparseVec, b: &SparseVec) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

impl Retriever for TfidfRetriever {
    fn search(&self, query: &str, top_k: usize) -> Vec<Fragment> {
        if query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_vec = vectorize(&self.vocabulary, &self.idf, &analyze(query));
        if query_vec.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vec)| (idx, dot(vec, &query_vec)))
            .filter(|(_, score)| score.is_finite())
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .filter(|(_, score)| *score > RELEVANCE_FLOOR)
            .map(|(idx, score)| {
                let chunk = &self.chunks[idx];
                Fragment {
                    id: chunk.id.clone(),
                    content: truncate_chars(&chunk.content, MAX_FRAGMENT_CHARS),
                    score,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::chunk_text;

    fn corpus() -> TfidfRetriever {
        let mut chunks = chunk_text(
            "marketing_calendar.md",
            "Summer Beverages 1997 ran from June 1 to June 30.\n\nWinter Classics 1997 ran in December.",
            60,
        );
        chunks.extend(chunk_text(
            "kpi_definitions.md",
            "Average Order Value is revenue divided by the number of orders.",
            400,
        ));
        chunks.extend(chunk_text(
            "product_policy.md",
            "Beverages unopened may be returned within 14 days.",
            400,
        ));
        TfidfRetriever::from_chunks(chunks)
    }

    #[test]
    fn test_analyze_unigrams_and_bigrams() {
        let terms = analyze("The Average Order Value");
        assert_eq!(terms, vec!["average", "order", "value", "average order", "order value"]);
    }

    #[test]
    fn test_analyze_drops_single_characters() {
        assert!(analyze("a b c").is_empty());
    }

    #[test]
    fn test_search_ranks_best_match_first() {
        let retriever = corpus();
        let results = retriever.search("What is the average order value definition?", 3);
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "kpi_definitions.md::chunk0");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_search_respects_top_k() {
        let retriever = corpus();
        assert!(retriever.search("beverages 1997", 1).len() <= 1);
    }

    #[test]
    fn test_search_empty_query() {
        let retriever = corpus();
        assert!(retriever.search("   ", 3).is_empty());
    }

    #[test]
    fn test_search_unknown_terms_return_nothing() {
        let retriever = corpus();
        assert!(retriever.search("zeppelin xylophone", 3).is_empty());
    }

    #[test]
    fn test_search_scores_above_floor() {
        let retriever = corpus();
        for fragment in retriever.search("returned beverages days", 3) {
            assert!(fragment.score > RELEVANCE_FLOOR);
            assert!(fragment.content.chars().count() <= MAX_FRAGMENT_CHARS);
        }
    }

    #[test]
    fn test_single_document_keeps_vocabulary() {
        let chunks = chunk_text("only.md", "Shipping policy for Northwind orders", 400);
        let retriever = TfidfRetriever::from_chunks(chunks);
        assert_eq!(retriever.len(), 1);
        let results = retriever.search("shipping policy", 3);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_open_empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TfidfRetriever::open(dir.path(), 400).err().unwrap();
        assert!(matches!(err, QuarryError::Retrieval(_)));
    }
}
