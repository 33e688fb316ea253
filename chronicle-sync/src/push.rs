//! Push coordination for the working and archive branches.
//!
//! Each branch is pushed independently; one rejection never stops the other.

use chronicle_core::types::{BranchName, BranchRole, SyncOutcome, SyncStatus};
use chronicle_git::Git;

pub fn push_branch(git: &Git, remote: &str, role: BranchRole, branch: &BranchName) -> SyncOutcome {
    match git.push(remote, branch) {
        Ok(()) => {
            tracing::info!("pushed {branch} to {remote}");
            SyncOutcome::new(role, branch.clone(), SyncStatus::Synchronized)
        }
        Err(err) => {
            tracing::warn!("push of {branch} to {remote} failed: {err}");
            SyncOutcome::failed(role, branch.clone(), err.to_string())
        }
    }
}

/// Push both branches. A missing archive branch is skipped, not failed.
pub fn push_all(
    git: &Git,
    remote: &str,
    working: &BranchName,
    archive: &BranchName,
) -> Vec<SyncOutcome> {
    let mut outcomes = vec![push_branch(git, remote, BranchRole::Working, working)];
    let archive_outcome = match git.branch_exists(archive) {
        Ok(true) => push_branch(git, remote, BranchRole::Archive, archive),
        Ok(false) => SyncOutcome::new(
            BranchRole::Archive,
            archive.clone(),
            SyncStatus::SkippedNotFound,
        ),
        Err(err) => SyncOutcome::failed(BranchRole::Archive, archive.clone(), err.to_string()),
    };
    outcomes.push(archive_outcome);
    outcomes
}

/// Outcomes recorded when the operator declined to push.
pub fn declined(working: &BranchName, archive: &BranchName) -> Vec<SyncOutcome> {
    vec![
        SyncOutcome::new(
            BranchRole::Working,
            working.clone(),
            SyncStatus::SkippedDeclined,
        ),
        SyncOutcome::new(
            BranchRole::Archive,
            archive.clone(),
            SyncStatus::SkippedDeclined,
        ),
    ]
}
