//! Read-only snapshot of the repository as the commit engine sees it.
//! Never fetches; divergence is computed against the last fetched ref.

use serde::Serialize;

use chronicle_core::types::{BranchName, LedgerEntry};
use chronicle_core::ChronicleConfig;
use chronicle_git::{Git, GitError};

use crate::engine::{CommitEngine, Stage};
use crate::error::{AtStage, EngineError};
use crate::pending::{self, PendingMerge};

#[derive(Debug, Clone, Serialize)]
pub struct RepoStatus {
    /// `None` when HEAD is detached.
    pub current_branch: Option<BranchName>,
    pub working_branch: BranchName,
    pub on_working_branch: bool,
    pub archive_branch: BranchName,
    pub archive_exists: bool,
    pub behind: usize,
    pub staged_files: usize,
    pub untracked_files: usize,
    pub newest_entry: Option<LedgerEntry>,
    pub pending_merge: Option<PendingMerge>,
}

pub fn collect(git: &Git, config: &ChronicleConfig) -> Result<RepoStatus, EngineError> {
    let current_branch = match git.current_branch() {
        Ok(branch) => Some(branch),
        Err(GitError::DetachedHead) => None,
        Err(err) => return Err(err).at(Stage::Idle),
    };
    let working = config.working_branch.clone();
    let remote_ref = Git::remote_tracking_ref(&config.remote, &working);
    let engine = CommitEngine::new(git, config);

    Ok(RepoStatus {
        on_working_branch: current_branch.as_ref() == Some(&working),
        current_branch,
        archive_exists: git.branch_exists(&config.archive_branch).at(Stage::Idle)?,
        archive_branch: config.archive_branch.clone(),
        behind: git
            .divergence_count(&format!("refs/heads/{working}"), &remote_ref)
            .at(Stage::Idle)?,
        staged_files: git.staged_diff().at(Stage::Idle)?.len(),
        untracked_files: git.untracked_files().at(Stage::Idle)?.len(),
        newest_entry: engine.ledger().most_recent_entry().at(Stage::Idle)?,
        pending_merge: pending::load_at(git.git_dir())?,
        working_branch: working,
    })
}
