//! Archive branch synchronization.
//!
//! Overlays the working branch's committed tree onto the archive branch and
//! commits the difference. Archive-only paths survive, so the archive grows
//! monotonically and keeps everything that was ever removed from the working
//! branch.
//!
//! [`synchronize`] never returns an error. Whatever happens, the original
//! branch is checked out again and any uncommitted local state (the staged
//! ledger hash from the current run included) is restored before it returns.

use chronicle_core::types::{BranchName, BranchRole, CommitHash, SyncOutcome, SyncStatus};
use chronicle_git::{BranchGuard, Git, GitError};

pub fn synchronize(git: &Git, working: &BranchName, archive: &BranchName) -> SyncOutcome {
    let failed = |message: String| {
        tracing::warn!("archive sync of '{archive}' failed: {message}");
        SyncOutcome::failed(BranchRole::Archive, archive.clone(), message)
    };

    match git.branch_exists(archive) {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!("archive branch '{archive}' not found, skipping sync");
            return SyncOutcome::new(
                BranchRole::Archive,
                archive.clone(),
                SyncStatus::SkippedNotFound,
            );
        }
        Err(err) => return failed(err.to_string()),
    }

    let guard = match BranchGuard::acquire(git) {
        Ok(guard) => guard,
        Err(err) => return failed(err.to_string()),
    };
    let stashed = match git.stash() {
        Ok(stashed) => stashed,
        Err(err) => {
            drop(guard);
            return failed(format!("could not set local changes aside: {err}"));
        }
    };

    let result = overlay_and_commit(git, working, archive);
    if result.is_err() && git.current_branch().ok().as_ref() == Some(archive) {
        if let Err(err) = git.reset_hard() {
            tracing::error!("could not clean '{archive}' after failed sync: {err}");
        }
    }

    let original = guard.original().clone();
    if let Err(err) = guard.release() {
        // Popping onto the wrong branch would be worse than leaving the stash.
        let mut message = format!("could not return to '{original}': {err}");
        if stashed {
            message.push_str("; local changes are in `git stash list`");
        }
        return failed(message);
    }
    if stashed {
        if let Err(err) = git.stash_pop() {
            return failed(format!(
                "local changes could not be restored (`git stash pop --index`): {err}"
            ));
        }
    }

    match result {
        Ok(new_commit) => {
            let mut outcome = SyncOutcome::new(
                BranchRole::Archive,
                archive.clone(),
                SyncStatus::Synchronized,
            );
            outcome.new_commit = new_commit;
            outcome
        }
        Err(err) => failed(err.to_string()),
    }
}

/// Runs with the archive branch checked out. `None` when it was already up
/// to date.
fn overlay_and_commit(
    git: &Git,
    working: &BranchName,
    archive: &BranchName,
) -> Result<Option<CommitHash>, GitError> {
    git.checkout(archive)?;
    git.checkout_tree_from(working)?;
    if !git.has_staged_changes()? {
        tracing::debug!("'{archive}' already contains '{working}'");
        return Ok(None);
    }
    let source = git.resolve(working.as_str())?;
    let message = match source {
        Some(hash) => format!("Sync {archive} with {working} at {}", hash.short()),
        None => format!("Sync {archive} with {working}"),
    };
    let hash = git.commit(&message)?;
    tracing::info!("archive '{archive}' advanced to {}", hash.short());
    Ok(Some(hash))
}
