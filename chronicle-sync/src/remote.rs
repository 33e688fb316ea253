//! Remote divergence check and post-commit integration.

use std::path::PathBuf;

use serde::Serialize;

use chronicle_core::types::{BranchName, CommitHash};
use chronicle_git::{Git, GitError};

/// What the engine learned about the remote before committing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCheck {
    pub remote_ref: String,
    /// Commits on the remote-tracking ref missing locally.
    pub behind: usize,
    /// Set when the fetch failed; `behind` then reflects the last fetch.
    pub fetch_error: Option<String>,
}

/// Fetch `remote` and count commits on `<remote>/<branch>` missing from the
/// local branch.
///
/// A missing remote or an unreachable one is not an error: the count falls
/// back to whatever tracking ref is already present (zero if none).
pub fn check_divergence(
    git: &Git,
    remote: &str,
    branch: &BranchName,
) -> Result<RemoteCheck, GitError> {
    let remote_ref = Git::remote_tracking_ref(remote, branch);

    let fetch_error = if !git.remote_exists(remote)? {
        Some(format!("remote '{remote}' is not configured"))
    } else {
        match git.fetch(remote) {
            Ok(()) => None,
            Err(GitError::Network { message, .. }) => Some(message),
            Err(other) => return Err(other),
        }
    };
    if let Some(message) = &fetch_error {
        tracing::warn!("fetch from {remote} skipped: {message}");
    }

    let behind = git.divergence_count(&format!("refs/heads/{branch}"), &remote_ref)?;
    tracing::debug!("{remote_ref} is {behind} commit(s) ahead of {branch}");
    Ok(RemoteCheck {
        remote_ref,
        behind,
        fetch_error,
    })
}

/// How the remote was folded into the freshly committed branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Integration {
    UpToDate,
    FastForwarded,
    Merged { merge_commit: CommitHash },
    /// Stopped with conflict markers in the working tree.
    ConflictPending { files: Vec<PathBuf> },
}

/// Pull `remote`/`branch` into the current branch with a merge (never rebase,
/// so the commit being recorded keeps its hash).
pub fn integrate(git: &Git, remote: &str, branch: &BranchName) -> Result<Integration, GitError> {
    let before = git.head_hash()?;
    match git.pull(remote, branch) {
        Ok(()) => {}
        Err(GitError::MergeConflict { files }) => {
            tracing::warn!("merge from {remote}/{branch} stopped on {} conflict(s)", files.len());
            return Ok(Integration::ConflictPending { files });
        }
        Err(other) => return Err(other),
    }

    let after = git.head_hash()?;
    if after == before {
        return Ok(Integration::UpToDate);
    }
    if git.parent_count("HEAD")? > 1 {
        tracing::info!("merged {remote}/{branch} as {}", after.short());
        Ok(Integration::Merged {
            merge_commit: after,
        })
    } else {
        Ok(Integration::FastForwarded)
    }
}
