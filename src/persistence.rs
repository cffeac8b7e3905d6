//! Write-through persistence of the three fields Raft requires survive a
//! restart: `current_term`, `voted_for`, and the log (§9). Bincode-encoded,
//! one file per node, matching the teacher's `persist_state_to_disk`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cluster::NodeId;
use crate::log::Log;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentState {
    pub current_term: u64,
    pub voted_for: Option<NodeId>,
    pub log: Log,
}

impl PersistentState {
    pub fn fresh() -> Self {
        Self {
            current_term: 0,
            voted_for: None,
            log: Log::new(),
        }
    }
}

/// Where a node's persisted state lives, given a data directory and its id.
pub fn state_file_path(data_dir: &Path, node_id: NodeId) -> PathBuf {
    data_dir.join(format!("raft_state_{node_id}.bin"))
}

/// Load a node's persisted state, or a fresh one if no file exists yet.
pub fn load(data_dir: &Path, node_id: NodeId) -> anyhow::Result<PersistentState> {
    let path = state_file_path(data_dir, node_id);
    if !path.exists() {
        return Ok(PersistentState::fresh());
    }
    let bytes = fs::read(&path)?;
    let state = bincode::deserialize(&bytes)?;
    Ok(state)
}

/// Persist a node's state, overwriting whatever was there before. Called
/// after every `step` that can change term, vote, or log (§9).
pub fn save(data_dir: &Path, node_id: NodeId, state: &PersistentState) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;
    let path = state_file_path(data_dir, node_id);
    let bytes = bincode::serialize(state)?;
    fs::write(path, bytes)?;
    Ok(())
}
