//! Error types for chronicle-sync.
//!
//! Only failures that can break the one-hash-per-commit ledger invariant (or
//! that happen before any mutation) surface here. Replication problems
//! (archive sync, push, fetch) are reported as outcomes and warnings instead.

use std::path::PathBuf;

use thiserror::Error;

use chronicle_core::error::LedgerError;
use chronicle_git::GitError;

use crate::engine::Stage;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Not on the expected branch, detached HEAD, merge already in progress.
    #[error("{reason}")]
    WrongContext { reason: String, remedy: String },

    #[error("git error while reaching {stage}: {source}")]
    Git {
        stage: Stage,
        #[source]
        source: GitError,
    },

    #[error("ledger error while reaching {stage}: {source}")]
    Ledger {
        stage: Stage,
        #[source]
        source: LedgerError,
    },

    /// The commit itself failed; ledger changes stay staged for inspection.
    #[error("commit failed: {source}")]
    CommitFailed {
        #[source]
        source: GitError,
    },

    #[error("a merge started by an earlier commit run is still pending (since {since})")]
    MergePending { since: String },

    #[error("no pending merge to continue")]
    NoPendingMerge,

    #[error("archive branch '{branch}' unavailable: {reason}")]
    ArchiveUnavailable { branch: String, reason: String },

    #[error("nothing to archive for '{target}'")]
    NothingToArchive { target: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pending-merge store (de)serialization.
    #[error("pending merge JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// The state the machine was trying to reach when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            EngineError::WrongContext { .. }
            | EngineError::MergePending { .. }
            | EngineError::NoPendingMerge => Stage::Validated,
            EngineError::Git { stage, .. } | EngineError::Ledger { stage, .. } => *stage,
            EngineError::CommitFailed { .. } => Stage::Committed,
            EngineError::ArchiveUnavailable { .. } | EngineError::NothingToArchive { .. } => {
                Stage::Validated
            }
            EngineError::Io { .. } | EngineError::Json(_) => Stage::RemoteIntegrated,
        }
    }

    /// One concrete corrective action for the operator.
    pub fn remedy(&self) -> String {
        match self {
            EngineError::WrongContext { remedy, .. } => remedy.clone(),
            EngineError::Ledger {
                source: LedgerError::Malformed { path, line, .. },
                ..
            } => format!(
                "fix {} by hand near line {line}, then rerun",
                path.display()
            ),
            EngineError::Ledger {
                source: LedgerError::PendingHash { .. },
                ..
            } => "attach the missing hash to the newest ledger entry, then rerun".to_string(),
            EngineError::Ledger { .. } => {
                "check the ledger file and its permissions, then rerun".to_string()
            }
            EngineError::Git { .. } => {
                "inspect `git status`, resolve the reported problem, then rerun".to_string()
            }
            EngineError::CommitFailed { .. } => "changes and the new ledger entry are still staged; \
                 inspect `git status` and `git diff --cached`, fix the cause, then rerun"
                .to_string(),
            EngineError::MergePending { .. } => {
                "resolve the conflicted files, `git add` them, then run `chronicle continue`"
                    .to_string()
            }
            EngineError::NoPendingMerge => "run `chronicle commit` instead".to_string(),
            EngineError::ArchiveUnavailable { branch, .. } => {
                format!("create it with `git branch {branch}` or check its state, then rerun")
            }
            EngineError::NothingToArchive { .. } => {
                "check the path or group id against `git ls-files`".to_string()
            }
            EngineError::Io { path, .. } => {
                format!("check permissions on {}, then rerun", path.display())
            }
            EngineError::Json(_) => {
                "remove the corrupt pending-merge file under .git/chronicle/ and rerun".to_string()
            }
        }
    }
}

/// Attach the target stage to lower-level errors.
pub(crate) trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, EngineError>;
}

impl<T> AtStage<T> for Result<T, GitError> {
    fn at(self, stage: Stage) -> Result<T, EngineError> {
        self.map_err(|source| EngineError::Git { stage, source })
    }
}

impl<T> AtStage<T> for Result<T, LedgerError> {
    fn at(self, stage: Stage) -> Result<T, EngineError> {
        self.map_err(|source| EngineError::Ledger { stage, source })
    }
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
