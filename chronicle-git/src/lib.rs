//! # chronicle-git
//!
//! Thin wrapper over the `git` executable. [`Git`] is the only component that
//! mutates repository state; [`BranchGuard`] restores the checked-out branch
//! on every exit path of an operation that switches branches.

pub mod error;
pub mod guard;
pub mod repository;

pub use error::GitError;
pub use guard::BranchGuard;
pub use repository::Git;
