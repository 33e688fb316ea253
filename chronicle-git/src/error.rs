//! Error types for chronicle-git.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` executable could not be started.
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("not a git repository: {}", .path.display())]
    NotARepository { path: PathBuf },

    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,

    #[error("branch '{branch}' not found")]
    BranchNotFound { branch: String },

    /// Fetch could not reach the remote. Recoverable.
    #[error("could not reach remote '{remote}': {message}")]
    Network { remote: String, message: String },

    #[error("merge conflict in {}", display_paths(.files))]
    MergeConflict { files: Vec<PathBuf> },

    #[error("push of '{branch}' rejected: {reason}")]
    PushRejected { branch: String, reason: String },

    /// Any other non-zero exit.
    #[error("`git {args}` failed: {stderr}")]
    Command { args: String, stderr: String },

    #[error("unexpected output from `git {args}`: {output}")]
    UnexpectedOutput { args: String, output: String },
}

fn display_paths(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
