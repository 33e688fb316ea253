//! Chronicle core library — domain types, ledger persistence, configuration.
//!
//! - [`types`] — newtypes and domain structs (entries, branches, change sets, outcomes)
//! - [`error`] — [`LedgerError`], [`ConfigError`]
//! - [`ledger`] — change-history file grammar and the [`LedgerStore`]
//! - [`config`] — [`ChronicleConfig`] load / save / init
//! - [`archive_index`] — retrieval index for files moved to the archive branch

pub mod archive_index;
pub mod config;
pub mod error;
pub mod ledger;
pub mod types;

pub use config::ChronicleConfig;
pub use error::{ConfigError, LedgerError};
pub use ledger::{LedgerDocument, LedgerStore};
pub use types::{
    BranchName, BranchRole, ChangeKind, CommitHash, LedgerEntry, StagedChangeSet, SyncOutcome,
    SyncStatus, Timestamp,
};
