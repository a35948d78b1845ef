// crates/quarry/src/cli/run.rs
// Batch command

use super::build_engine;
use crate::batch::{BatchOptions, BatchRunner, CheckpointStore};
use crate::config::Settings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Answer every question in `batch` and write the records to `out`
pub async fn run_batch(
    settings: &Settings,
    batch: &Path,
    out: &Path,
    checkpoint_dir: Option<PathBuf>,
    resume: bool,
) -> Result<()> {
    let engine = build_engine(settings)?;
    let checkpoints = checkpoint_dir
        .map(|dir| {
            CheckpointStore::open(&dir)
                .with_context(|| format!("Cannot open checkpoint dir {}", dir.display()))
        })
        .transpose()?;

    let runner = BatchRunner::new(&engine, BatchOptions { checkpoints, resume });
    let summary = runner.run_files(batch, out).await?;

    println!(
        "Answered {} questions ({} resumed, {} failed) -> {}",
        summary.total(),
        summary.resumed,
        summary.failed,
        out.display()
    );
    Ok(())
}
