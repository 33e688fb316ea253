//! Scoped branch restoration.
//!
//! [`BranchGuard::acquire`] records the checked-out branch. [`release`]
//! checks it out again and reports failure; if the guard is dropped without
//! being released (early `?` return, panic unwinding) the same restore runs
//! best-effort from `Drop` and failures are logged.
//!
//! [`release`]: BranchGuard::release

use chronicle_core::types::BranchName;

use crate::error::GitError;
use crate::repository::Git;

#[must_use = "dropping the guard immediately restores the branch"]
pub struct BranchGuard<'a> {
    git: &'a Git,
    original: BranchName,
    armed: bool,
}

impl<'a> BranchGuard<'a> {
    pub fn acquire(git: &'a Git) -> Result<Self, GitError> {
        let original = git.current_branch()?;
        Ok(Self {
            git,
            original,
            armed: true,
        })
    }

    pub fn original(&self) -> &BranchName {
        &self.original
    }

    /// Restore the original branch and disarm the guard.
    pub fn release(mut self) -> Result<(), GitError> {
        self.armed = false;
        self.restore()
    }

    fn restore(&self) -> Result<(), GitError> {
        let current = self.git.current_branch().ok();
        if current.as_ref() == Some(&self.original) {
            return Ok(());
        }
        self.git.checkout(&self.original)
    }
}

impl Drop for BranchGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.restore() {
            tracing::error!(
                "could not restore branch '{}': {err}; run `git checkout {}`",
                self.original,
                self.original
            );
        }
    }
}
