// crates/quarry/src/cli/ask.rs
// Single-question command

use super::build_engine;
use crate::batch::{BatchOptions, BatchRunner};
use crate::config::Settings;
use anyhow::Result;
use quarry_types::{BatchItem, FormatHint};

pub async fn run_ask(settings: &Settings, question: &str, format: &str) -> Result<()> {
    let engine = build_engine(settings)?;
    let item = BatchItem {
        id: "ask".to_string(),
        question: question.to_string(),
        format_hint: FormatHint::parse(format),
    };

    let record = BatchRunner::new(&engine, BatchOptions::default())
        .answer(&item)
        .await;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
