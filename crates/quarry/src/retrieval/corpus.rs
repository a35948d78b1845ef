// crates/quarry/src/retrieval/corpus.rs
// Load .txt/.md documents and pack paragraphs into fixed-size chunks

use crate::error::{QuarryError, Result};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A chunk of one source document
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `<file name>::chunk<N>`
    pub id: String,
    pub content: String,
    pub source: String,
}

fn is_document(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".txt") || lower.ends_with(".md")
}

/// Split text into paragraph-packed chunks of at most `chunk_size` characters.
///
/// A single paragraph longer than `chunk_size` becomes its own chunk.
pub fn chunk_text(source: &str, text: &str, chunk_size: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let flush = |content: &str, chunks: &mut Vec<Chunk>| {
        let idx = chunks.len();
        chunks.push(Chunk {
            id: format!("{}::chunk{}", source, idx),
            content: content.trim().to_string(),
            source: source.to_string(),
        });
    };

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_len = paragraph.chars().count();
        if current_len + para_len + 1 <= chunk_size {
            if current.is_empty() {
                current.push_str(paragraph);
                current_len = para_len;
            } else {
                current.push(' ');
                current.push_str(paragraph);
                current_len += para_len + 1;
            }
        } else {
            if !current.is_empty() {
                flush(&current, &mut chunks);
            }
            current = paragraph.to_string();
            current_len = para_len;
        }
    }

    if !current.is_empty() {
        flush(&current, &mut chunks);
    }
    chunks
}

/// Load every `.txt`/`.md` file directly under `docs_path`, in name order
pub fn load_corpus(docs_path: &Path, chunk_size: usize) -> Result<Vec<Chunk>> {
    if !docs_path.is_dir() {
        return Err(QuarryError::Retrieval(format!(
            "docs directory not found: {}",
            docs_path.display()
        )));
    }

    let mut chunks = Vec::new();
    let walker = WalkDir::new(docs_path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable docs entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_document(&name) {
            continue;
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to read document");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let file_chunks = chunk_text(&name, &text, chunk_size);
        debug!(file = %name, chunks = file_chunks.len(), "Loaded document");
        chunks.extend(file_chunks);
    }

    Ok(chunks)
}
