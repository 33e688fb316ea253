//! Ledger consistency check.
//!
//! Findings, in the order they are reported for each entry:
//! 1. `UnhashedBelowTop`: only the newest entry may lack a hash
//! 2. `OutOfOrder`: timestamps must strictly decrease down the file
//! 3. `UnknownCommit`: a recorded hash does not resolve to a commit
//!
//! A missing ledger is reported as `Missing`, not as an error. A ledger that
//! does not parse is an error.

use std::fmt;

use serde::Serialize;

use chronicle_core::types::{CommitHash, Timestamp};
use chronicle_core::{ChronicleConfig, LedgerStore};
use chronicle_git::Git;

use crate::engine::Stage;
use crate::error::{AtStage, EngineError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum LedgerFinding {
    Missing,
    UnhashedBelowTop { entry: Timestamp, position: usize },
    OutOfOrder { entry: Timestamp, newer: Timestamp },
    UnknownCommit { entry: Timestamp, commit: CommitHash },
}

impl fmt::Display for LedgerFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerFinding::Missing => write!(f, "ledger file does not exist"),
            LedgerFinding::UnhashedBelowTop { entry, position } => {
                write!(f, "entry {entry} (#{position}) has no commit hash but is not the newest")
            }
            LedgerFinding::OutOfOrder { entry, newer } => {
                write!(f, "entry {entry} is not older than the entry above it ({newer})")
            }
            LedgerFinding::UnknownCommit { entry, commit } => {
                write!(f, "entry {entry} points at {commit}, which is not a commit here")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub entries: usize,
    /// Newest entry is waiting for its hash (normal between runs).
    pub pending_hash: bool,
    pub findings: Vec<LedgerFinding>,
}

impl Verification {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

pub fn verify(git: &Git, config: &ChronicleConfig) -> Result<Verification, EngineError> {
    let store = LedgerStore::new(
        config.ledger_path_in(git.root()),
        config.ledger_title.clone(),
    );
    let Some(doc) = store.load().at(Stage::Validated)? else {
        return Ok(Verification {
            entries: 0,
            pending_hash: false,
            findings: vec![LedgerFinding::Missing],
        });
    };

    let mut findings = Vec::new();
    for (idx, entry) in doc.entries.iter().enumerate() {
        if idx > 0 && !entry.is_hashed() {
            findings.push(LedgerFinding::UnhashedBelowTop {
                entry: entry.timestamp.clone(),
                position: idx + 1,
            });
        }
        if let Some(above) = idx.checked_sub(1).map(|i| &doc.entries[i]) {
            if !above.timestamp.is_after(&entry.timestamp) {
                findings.push(LedgerFinding::OutOfOrder {
                    entry: entry.timestamp.clone(),
                    newer: above.timestamp.clone(),
                });
            }
        }
        if let Some(hash) = &entry.commit_hash {
            if !git.commit_exists(hash).at(Stage::Validated)? {
                findings.push(LedgerFinding::UnknownCommit {
                    entry: entry.timestamp.clone(),
                    commit: hash.clone(),
                });
            }
        }
    }
    tracing::debug!(
        "verified {} ledger entries, {} finding(s)",
        doc.entries.len(),
        findings.len()
    );

    Ok(Verification {
        entries: doc.entries.len(),
        pending_hash: doc.newest().is_some_and(|e| !e.is_hashed()),
        findings,
    })
}
