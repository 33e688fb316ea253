//! # chronicle-sync
//!
//! Commit orchestration: the ledger/commit state machine and the replication
//! steps around it.
//!
//! Call [`CommitEngine::run`] for a full `commit`, [`CommitEngine::resume`]
//! after resolving a merge conflict, or [`pipeline::run`] to move paths to the
//! archive branch and commit the removal.

pub mod archive;
pub mod engine;
pub mod error;
pub mod pending;
pub mod pipeline;
pub mod prompt;
pub mod push;
pub mod remote;
pub mod staging;
pub mod status;
pub mod verify;

pub use engine::{
    AbortReason, CommitEngine, CommitOptions, CommitReport, PushPolicy, Repair, RunStatus, Stage,
};
pub use error::EngineError;
pub use prompt::{AssumeDefaults, AssumeYes, Decision, Prompter, Question};
pub use remote::Integration;
