// crates/quarry/src/batch/checkpoint.rs
// Terminal run states persisted per run id so a batch can resume

use crate::engine::RunState;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory of `<run_id>.json` files
pub struct CheckpointStore {
    dir: PathBuf,
}

/// Keep run ids usable as file names
fn file_stem(run_id: &str) -> String {
    run_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl CheckpointStore {
    /// Open (creating if needed) a checkpoint directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(run_id)))
    }

    /// Stored terminal state for `run_id`; unreadable files count as absent
    pub fn load(&self, run_id: &str) -> Option<RunState> {
        let path = self.path_for(run_id);
        let bytes = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable checkpoint");
                None
            }
        }
    }

    pub fn save(&self, state: &RunState) -> Result<()> {
        let path = self.path_for(&state.run_id);
        std::fs::write(&path, serde_json::to_vec_pretty(state)?)?;
        debug!(path = %path.display(), "Checkpoint written");
        Ok(())
    }
}
