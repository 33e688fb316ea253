//! Pending-merge store.
//!
//! When integration stops on a conflict the run cannot finish: the commit
//! exists but its ledger entry has no hash yet. The facts needed to finish
//! later are persisted as JSON at `<git-dir>/chronicle/pending.json` and
//! consumed by `chronicle continue`. Writes use the `.tmp` + rename pattern.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chronicle_core::types::{BranchName, CommitHash, Timestamp};

use crate::error::{io_err, EngineError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMerge {
    pub started_at: DateTime<Utc>,
    pub working_branch: BranchName,
    pub remote: String,
    /// Commit created before the merge was attempted.
    pub commit: CommitHash,
    /// Ledger entry that still needs `commit` attached.
    pub entry: Timestamp,
    pub behind: usize,
}

/// `<git-dir>/chronicle/pending.json`
pub fn pending_path_at(git_dir: &Path) -> PathBuf {
    git_dir.join("chronicle").join("pending.json")
}

/// `None` when no merge is pending.
pub fn load_at(git_dir: &Path) -> Result<Option<PendingMerge>, EngineError> {
    let path = pending_path_at(git_dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

pub fn save_at(git_dir: &Path, pending: &PendingMerge) -> Result<(), EngineError> {
    let path = pending_path_at(git_dir);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid pending merge path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(pending)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// Remove the record. Missing is fine.
pub fn clear_at(git_dir: &Path) -> Result<(), EngineError> {
    let path = pending_path_at(git_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(&path, e)),
    }
}
