// crates/quarry/src/cli/inspect.rs
// Diagnostics: retrieval, schema and configuration

use crate::config::Settings;
use crate::engine::sql_text::render_schema;
use crate::retrieval::{Retriever, TfidfRetriever};
use crate::store::{QueryStore, SqliteStore};
use crate::utils::truncate_chars;
use anyhow::{Result, bail};

const PREVIEW_CHARS: usize = 160;

/// Print the fragments a query retrieves, best first
pub fn run_search(settings: &Settings, query: &str) -> Result<()> {
    let retriever = TfidfRetriever::open(&settings.docs_path, settings.chunk_size)?;
    let results = retriever.search(query, settings.top_k);

    if results.is_empty() {
        println!("No fragments above the relevance floor.");
        return Ok(());
    }
    for fragment in results {
        println!("{:.4}  {}", fragment.score, fragment.id);
        println!(
            "        {}",
            truncate_chars(&fragment.content.replace('\n', " "), PREVIEW_CHARS)
        );
    }
    Ok(())
}

pub async fn run_schema(settings: &Settings) -> Result<()> {
    let store = SqliteStore::open(&settings.db_path)?;
    let entries = store.schema().await;
    if entries.is_empty() {
        bail!("No domain tables found in {}", settings.db_path.display());
    }
    println!("{}", render_schema(&entries));
    Ok(())
}

/// Print the resolved settings and their validation report
pub fn run_check(settings: &Settings) -> Result<()> {
    println!("Model:     {}", settings.model);
    println!("Endpoint:  {}", settings.base_url);
    println!("Database:  {}", settings.db_path.display());
    println!("Docs:      {}", settings.docs_path.display());
    println!(
        "Trace:     {}",
        settings
            .trace_path
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |p| p.display().to_string())
    );
    println!("Retrieval: top_k={} chunk_size={}", settings.top_k, settings.chunk_size);
    println!();

    let validation = settings.validate();
    println!("{}", validation.report());
    validation.into_result()?;
    Ok(())
}
