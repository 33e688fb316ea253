//! The commit state machine.
//!
//! ```text
//! Idle -> Validated -> RemoteChecked -> Staged -> LedgerDrafted -> Committed
//!      -> RemoteIntegrated -> HashAttached -> Reported
//! ```
//!
//! with `Aborted` reachable from the first three steps and `ConflictPending`
//! from integration. The engine is run once per invocation; nothing is kept
//! in memory between runs.
//!
//! # Hash lag
//!
//! A commit cannot contain its own hash. Each run therefore appends an
//! unhashed entry, commits, and only then writes the hash into that entry
//! and stages the edit. The staged edit rides along with the next run's
//! commit, so after every completed run the committed ledger has exactly one
//! unhashed entry (the newest) and the working copy has none.
//!
//! # Repair
//!
//! If a run starts and the newest ledger entry has no hash, a previous run
//! was interrupted. The entry is looked up in history: if a commit added it,
//! that commit's hash is attached; otherwise the entry was never committed
//! and is discarded so the new entry can replace it.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use chronicle_core::error::LedgerError;
use chronicle_core::types::{
    header_prefix, CommitHash, LedgerEntry, SyncOutcome, SyncStatus, Timestamp,
};
use chronicle_core::{ChronicleConfig, LedgerStore};
use chronicle_git::{Git, GitError};

use crate::error::{AtStage, EngineError};
use crate::pending::{self, PendingMerge};
use crate::prompt::{Prompter, Question};
use crate::remote::{self, Integration};
use crate::{archive, push, staging};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Validated,
    RemoteChecked,
    Staged,
    LedgerDrafted,
    Committed,
    ConflictPending,
    RemoteIntegrated,
    HashAttached,
    Reported,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Validated => "validated",
            Stage::RemoteChecked => "remote-checked",
            Stage::Staged => "staged",
            Stage::LedgerDrafted => "ledger-drafted",
            Stage::Committed => "committed",
            Stage::ConflictPending => "conflict-pending",
            Stage::RemoteIntegrated => "remote-integrated",
            Stage::HashAttached => "hash-attached",
            Stage::Reported => "reported",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushPolicy {
    /// Ask the prompter.
    #[default]
    Ask,
    Always,
    Never,
}

#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Replaces the generated summary.
    pub message: Option<String>,
    pub push: PushPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    DivergenceDeclined { behind: usize },
    UntrackedDeclined { files: Vec<PathBuf> },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::DivergenceDeclined { behind } => {
                write!(f, "remote is {behind} commit(s) ahead and merging was declined")
            }
            AbortReason::UntrackedDeclined { files } => {
                write!(f, "{} untracked file(s) were not to be included", files.len())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NothingToCommit,
    Aborted { reason: AbortReason },
    ConflictPending { files: Vec<PathBuf> },
}

/// What an interrupted earlier run left behind, and what was done about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Repair {
    HashAttached { entry: Timestamp, commit: CommitHash },
    DraftDiscarded { entry: Timestamp },
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub status: RunStatus,
    /// Last state reached.
    pub reached: Stage,
    pub commit: Option<CommitHash>,
    pub entry: Option<Timestamp>,
    pub summary: Option<String>,
    pub behind: usize,
    pub integration: Option<Integration>,
    pub repair: Option<Repair>,
    pub archive: Option<SyncOutcome>,
    pub pushes: Vec<SyncOutcome>,
    pub warnings: Vec<String>,
}

impl CommitReport {
    fn new() -> Self {
        Self {
            status: RunStatus::Completed,
            reached: Stage::Idle,
            commit: None,
            entry: None,
            summary: None,
            behind: 0,
            integration: None,
            repair: None,
            archive: None,
            pushes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    fn aborted(mut self, reason: AbortReason) -> Self {
        tracing::info!("aborted: {reason}");
        self.status = RunStatus::Aborted { reason };
        self.reached = Stage::Aborted;
        self
    }

    /// 8-character form of the recorded commit.
    pub fn short_commit(&self) -> Option<&str> {
        self.commit.as_ref().map(CommitHash::short)
    }

    /// True if any replication step (archive sync or push) failed.
    pub fn has_replication_failures(&self) -> bool {
        self.archive.iter().chain(&self.pushes).any(|o| o.status.is_failed())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A run that got past both questions without touching the repository.
pub(crate) struct Preflight {
    report: CommitReport,
    check: remote::RemoteCheck,
}

pub(crate) enum Checked {
    Ready(Preflight),
    /// The operator said no; the report is `Aborted`.
    Declined(CommitReport),
}

pub struct CommitEngine<'a> {
    git: &'a Git,
    config: &'a ChronicleConfig,
    ledger: LedgerStore,
    /// Ledger path relative to the repository root, for git commands.
    ledger_rel: PathBuf,
}

impl<'a> CommitEngine<'a> {
    pub fn new(git: &'a Git, config: &'a ChronicleConfig) -> Self {
        let ledger_rel = relative_to(git.root(), &config.ledger_path);
        let ledger = LedgerStore::new(git.root().join(&ledger_rel), config.ledger_title.clone());
        Self {
            git,
            config,
            ledger,
            ledger_rel,
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Run a full commit.
    ///
    /// Errors are returned only for failures that happen before the commit
    /// or that would break the ledger; archive and push problems are recorded
    /// in the report.
    pub fn run(
        &self,
        options: &CommitOptions,
        prompter: &mut dyn Prompter,
    ) -> Result<CommitReport, EngineError> {
        match self.preflight(prompter)? {
            Checked::Ready(preflight) => self.commit(preflight, options, prompter),
            Checked::Declined(report) => Ok(report),
        }
    }

    /// Steps up to `RemoteChecked`, including both questions. Mutates
    /// nothing.
    pub(crate) fn preflight(&self, prompter: &mut dyn Prompter) -> Result<Checked, EngineError> {
        let mut report = CommitReport::new();

        self.validate()?;
        report.reached = Stage::Validated;

        let working = &self.config.working_branch;
        let check = match remote::check_divergence(self.git, &self.config.remote, working) {
            Ok(check) => check,
            Err(err) => {
                report.warn(format!("remote check skipped: {err}"));
                remote::RemoteCheck {
                    remote_ref: Git::remote_tracking_ref(&self.config.remote, working),
                    behind: 0,
                    fetch_error: Some(err.to_string()),
                }
            }
        };
        if let Some(message) = &check.fetch_error {
            report
                .warnings
                .push(format!("could not fetch {}: {message}", self.config.remote));
        }
        report.behind = check.behind;
        if check.behind > 0 {
            let question = Question::ProceedWithDivergence {
                remote_ref: check.remote_ref.clone(),
                behind: check.behind,
            };
            if !prompter.confirm(&question).accepted() {
                return Ok(Checked::Declined(report.aborted(
                    AbortReason::DivergenceDeclined {
                        behind: check.behind,
                    },
                )));
            }
        }
        report.reached = Stage::RemoteChecked;

        let untracked = self.git.untracked_files().at(Stage::Staged)?;
        if !untracked.is_empty() {
            let question = Question::IncludeUntracked {
                files: untracked.clone(),
            };
            if !prompter.confirm(&question).accepted() {
                return Ok(Checked::Declined(
                    report.aborted(AbortReason::UntrackedDeclined { files: untracked }),
                ));
            }
        }
        Ok(Checked::Ready(Preflight { report, check }))
    }

    /// Everything from staging on, after a successful [`preflight`].
    ///
    /// [`preflight`]: CommitEngine::preflight
    pub(crate) fn commit(
        &self,
        preflight: Preflight,
        options: &CommitOptions,
        prompter: &mut dyn Prompter,
    ) -> Result<CommitReport, EngineError> {
        let Preflight { mut report, check } = preflight;
        let working = &self.config.working_branch;

        self.git.stage_all().at(Stage::Staged)?;
        let staged = self.git.staged_diff().at(Stage::Staged)?;
        let head_entry = self.ledger.most_recent_entry().at(Stage::Staged)?;
        let stale_draft = head_entry.filter(|e| !e.is_hashed());
        if staged.is_empty() && stale_draft.is_none() {
            tracing::info!("nothing staged, nothing to record");
            report.status = RunStatus::NothingToCommit;
            report.reached = Stage::Reported;
            return Ok(report);
        }
        report.reached = Stage::Staged;

        if let Some(draft) = stale_draft {
            let repair = self.repair(&draft)?;
            report.warn(match &repair {
                Repair::HashAttached { entry, commit } => format!(
                    "entry {entry} was committed as {} without its hash; attached it now",
                    commit.short()
                ),
                Repair::DraftDiscarded { entry } => {
                    format!("entry {entry} was never committed; replaced it with a new entry")
                }
            });
            report.repair = Some(repair);
        }

        let staged = self.git.staged_diff().at(Stage::LedgerDrafted)?;
        let draft = staging::draft(
            &staged,
            &self.ledger_rel,
            options.message.as_deref(),
            self.config,
        );
        let timestamp = self.next_timestamp()?;
        let entry = self
            .ledger
            .append_entry(timestamp.clone(), &draft.summary)
            .at(Stage::LedgerDrafted)?;
        self.git
            .stage_path(&self.ledger_rel)
            .at(Stage::LedgerDrafted)?;
        report.entry = Some(timestamp.clone());
        report.summary = Some(entry.summary);
        report.reached = Stage::LedgerDrafted;

        let commit = self
            .git
            .commit(&draft.commit_message())
            .map_err(|source| EngineError::CommitFailed { source })?;
        tracing::info!("committed {} for entry {timestamp}", commit.short());
        report.commit = Some(commit.clone());
        report.reached = Stage::Committed;

        if check.behind > 0 {
            match remote::integrate(self.git, &self.config.remote, working) {
                Ok(Integration::ConflictPending { files }) => {
                    pending::save_at(
                        self.git.git_dir(),
                        &PendingMerge {
                            started_at: Utc::now(),
                            working_branch: working.clone(),
                            remote: self.config.remote.clone(),
                            commit,
                            entry: timestamp,
                            behind: check.behind,
                        },
                    )?;
                    report.integration = Some(Integration::ConflictPending {
                        files: files.clone(),
                    });
                    report.status = RunStatus::ConflictPending { files };
                    report.reached = Stage::ConflictPending;
                    return Ok(report);
                }
                Ok(integration) => report.integration = Some(integration),
                Err(err) => report.warn(format!(
                    "could not merge {}/{working}: {err}; run `git pull` later",
                    self.config.remote
                )),
            }
        }
        report.reached = Stage::RemoteIntegrated;

        self.finish(&commit, &timestamp, &mut report, options, prompter)?;
        Ok(report)
    }

    /// Finish a run that stopped on a merge conflict, once the operator has
    /// resolved and staged every conflicted file.
    pub fn resume(
        &self,
        options: &CommitOptions,
        prompter: &mut dyn Prompter,
    ) -> Result<CommitReport, EngineError> {
        let mut report = CommitReport::new();
        self.validate_branch()?;
        let pending = pending::load_at(self.git.git_dir())?.ok_or(EngineError::NoPendingMerge)?;
        report.commit = Some(pending.commit.clone());
        report.entry = Some(pending.entry.clone());
        report.behind = pending.behind;
        report.reached = Stage::ConflictPending;

        let conflicts = self.git.conflicted_files().at(Stage::RemoteIntegrated)?;
        if !conflicts.is_empty() {
            report.integration = Some(Integration::ConflictPending {
                files: conflicts.clone(),
            });
            report.status = RunStatus::ConflictPending { files: conflicts };
            return Ok(report);
        }

        let integration = if self.git.merge_in_progress().at(Stage::RemoteIntegrated)? {
            let merge_commit = self.git.commit_merge().at(Stage::RemoteIntegrated)?;
            tracing::info!("concluded merge as {}", merge_commit.short());
            Integration::Merged { merge_commit }
        } else {
            Integration::UpToDate
        };
        report.integration = Some(integration);
        pending::clear_at(self.git.git_dir())?;
        report.reached = Stage::RemoteIntegrated;

        self.finish(&pending.commit, &pending.entry, &mut report, options, prompter)?;
        Ok(report)
    }

    /// Pre-flight checks shared with the archive flows.
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        self.validate_branch()?;
        if let Some(pending) = pending::load_at(self.git.git_dir())? {
            return Err(EngineError::MergePending {
                since: pending.started_at.to_rfc3339(),
            });
        }
        if self.git.merge_in_progress().at(Stage::Validated)? {
            return Err(EngineError::WrongContext {
                reason: "a merge is in progress".to_string(),
                remedy: "finish it with `git commit` or drop it with `git merge --abort`"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_branch(&self) -> Result<(), EngineError> {
        let expected = &self.config.working_branch;
        let current = match self.git.current_branch() {
            Ok(branch) => branch,
            Err(GitError::DetachedHead) => {
                return Err(EngineError::WrongContext {
                    reason: "HEAD is detached".to_string(),
                    remedy: format!("git checkout {expected}"),
                })
            }
            Err(err) => return Err(err).at(Stage::Validated),
        };
        if &current != expected {
            return Err(EngineError::WrongContext {
                reason: format!("on branch '{current}', expected '{expected}'"),
                remedy: format!("git checkout {expected}"),
            });
        }
        Ok(())
    }

    /// Deal with an unhashed newest entry left by an interrupted run.
    fn repair(&self, draft: &LedgerEntry) -> Result<Repair, EngineError> {
        let needle = header_prefix(&draft.timestamp);
        let introduced = self
            .git
            .commit_introducing(&self.ledger_rel, &needle)
            .at(Stage::LedgerDrafted)?;
        match introduced {
            Some(commit) => {
                self.ledger
                    .attach_hash(&draft.timestamp, commit.clone())
                    .at(Stage::LedgerDrafted)?;
                self.git
                    .stage_path(&self.ledger_rel)
                    .at(Stage::LedgerDrafted)?;
                Ok(Repair::HashAttached {
                    entry: draft.timestamp.clone(),
                    commit,
                })
            }
            None => {
                self.git
                    .unstage_path(&self.ledger_rel)
                    .at(Stage::LedgerDrafted)?;
                self.ledger
                    .discard_draft(&draft.timestamp)
                    .at(Stage::LedgerDrafted)?;
                Ok(Repair::DraftDiscarded {
                    entry: draft.timestamp.clone(),
                })
            }
        }
    }

    /// Now, or one second past the newest entry if the clock has not moved on.
    fn next_timestamp(&self) -> Result<Timestamp, EngineError> {
        let now = Timestamp::now();
        let newest = self.ledger.most_recent_entry().at(Stage::LedgerDrafted)?;
        Ok(match newest {
            Some(entry) if !now.is_after(&entry.timestamp) => entry.timestamp.plus_seconds(1),
            _ => now,
        })
    }

    /// Hash attachment, archive sync and push.
    fn finish(
        &self,
        commit: &CommitHash,
        entry: &Timestamp,
        report: &mut CommitReport,
        options: &CommitOptions,
        prompter: &mut dyn Prompter,
    ) -> Result<(), EngineError> {
        match self.ledger.attach_hash(entry, commit.clone()) {
            Ok(_) => {
                self.git
                    .stage_path(&self.ledger_rel)
                    .at(Stage::HashAttached)?;
                tracing::debug!("attached {} to entry {entry}", commit.short());
            }
            Err(LedgerError::EntryNotFound { timestamp }) => report.warn(format!(
                "entry {timestamp} is gone from the ledger (merge resolution?); \
                 hash {} was not recorded",
                commit.short()
            )),
            Err(err) => return Err(err).at(Stage::HashAttached),
        }
        report.reached = Stage::HashAttached;

        let working = &self.config.working_branch;
        let archive_branch = &self.config.archive_branch;
        let archive = archive::synchronize(self.git, working, archive_branch);
        if let Some(message) = failure_message(&archive) {
            report
                .warnings
                .push(format!("archive sync of {archive_branch} failed: {message}"));
        }
        report.archive = Some(archive);

        let push = match options.push {
            PushPolicy::Always => true,
            PushPolicy::Never => false,
            PushPolicy::Ask => prompter
                .confirm(&Question::PushBranches {
                    remote: self.config.remote.clone(),
                    branches: vec![working.clone(), archive_branch.clone()],
                })
                .accepted(),
        };
        report.pushes = if push {
            push::push_all(self.git, &self.config.remote, working, archive_branch)
        } else {
            push::declined(working, archive_branch)
        };
        let push_failures: Vec<String> = report
            .pushes
            .iter()
            .filter_map(|o| failure_message(o).map(|m| format!("push of {} failed: {m}", o.branch)))
            .collect();
        report.warnings.extend(push_failures);

        report.status = RunStatus::Completed;
        report.reached = Stage::Reported;
        Ok(())
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

fn failure_message(outcome: &SyncOutcome) -> Option<&str> {
    match &outcome.status {
        SyncStatus::Failed { message } => Some(message),
        _ => None,
    }
}
