//! Archive flows: move paths off the working branch and commit the removal.
//!
//! Both `chronicle archive` and `chronicle archive-batch` go through [`run`].
//! The archive branch is synchronized first, and unlike during a plain commit
//! a failed sync is fatal here: removing a path from the working branch is
//! only safe once the archive is known to hold it.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use chronicle_core::archive_index::{self, ArchiveRecord};
use chronicle_core::types::{BranchRole, SyncOutcome, SyncStatus, Timestamp};
use chronicle_core::ChronicleConfig;
use chronicle_git::Git;

use crate::archive;
use crate::engine::{Checked, CommitEngine, CommitOptions, CommitReport, Stage};
use crate::error::{AtStage, EngineError};
use crate::prompt::Prompter;

const INDEX_TITLE: &str = "Archive Index";

/// What to archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveScope {
    /// One tracked file or directory, relative to the repository root.
    Path(PathBuf),
    /// Every tracked path belonging to a group id (see [`match_group`]).
    Group(String),
}

impl ArchiveScope {
    fn label(&self) -> String {
        match self {
            ArchiveScope::Path(path) => path.display().to_string(),
            ArchiveScope::Group(id) => id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub targets: Vec<PathBuf>,
    pub sync: SyncOutcome,
    pub commit: CommitReport,
}

/// Run an archive flow for `scope`.
pub fn run(
    git: &Git,
    config: &ChronicleConfig,
    scope: &ArchiveScope,
    reason: Option<&str>,
    options: &CommitOptions,
    prompter: &mut dyn Prompter,
) -> Result<ArchiveReport, EngineError> {
    let engine = CommitEngine::new(git, config);
    engine.validate()?;

    let targets = resolve_targets(git, scope)?;
    tracing::info!("archiving {} path(s) for '{}'", targets.len(), scope.label());

    // Both questions come before any change to the tree or the archive branch.
    let preflight = match engine.preflight(prompter)? {
        Checked::Ready(preflight) => preflight,
        Checked::Declined(commit) => {
            return Ok(ArchiveReport {
                targets,
                sync: SyncOutcome::new(
                    BranchRole::Archive,
                    config.archive_branch.clone(),
                    SyncStatus::SkippedDeclined,
                ),
                commit,
            })
        }
    };

    let sync = archive::synchronize(git, &config.working_branch, &config.archive_branch);
    match &sync.status {
        SyncStatus::Synchronized => {}
        SyncStatus::SkippedNotFound => {
            return Err(EngineError::ArchiveUnavailable {
                branch: config.archive_branch.to_string(),
                reason: "branch does not exist".to_string(),
            })
        }
        SyncStatus::SkippedDeclined => {
            return Err(EngineError::ArchiveUnavailable {
                branch: config.archive_branch.to_string(),
                reason: "sync was skipped".to_string(),
            })
        }
        SyncStatus::Failed { message } => {
            return Err(EngineError::ArchiveUnavailable {
                branch: config.archive_branch.to_string(),
                reason: message.clone(),
            })
        }
    }

    for target in &targets {
        git.remove_path(target).at(Stage::Staged)?;
    }

    let archived_at = Timestamp::now();
    let reason = reason.map(str::trim).unwrap_or_default().to_string();
    let records: Vec<ArchiveRecord> = targets
        .iter()
        .map(|path| ArchiveRecord {
            archived_at: archived_at.clone(),
            path: path.clone(),
            reason: reason.clone(),
            archive_branch: config.archive_branch.clone(),
        })
        .collect();
    let index_path = config.archive_index_path_in(git.root());
    archive_index::append_records(&index_path, INDEX_TITLE, &records).at(Stage::Staged)?;
    git.stage_path(&index_path).at(Stage::Staged)?;

    let options = CommitOptions {
        message: Some(
            options
                .message
                .clone()
                .unwrap_or_else(|| archive_message(config, scope, &targets, &reason)),
        ),
        push: options.push,
    };
    let commit = engine.commit(preflight, &options, prompter)?;
    Ok(ArchiveReport {
        targets,
        sync,
        commit,
    })
}

fn resolve_targets(git: &Git, scope: &ArchiveScope) -> Result<Vec<PathBuf>, EngineError> {
    let targets = match scope {
        ArchiveScope::Path(path) => {
            if git.is_tracked(path).at(Stage::Validated)? {
                vec![path.clone()]
            } else {
                Vec::new()
            }
        }
        ArchiveScope::Group(id) => {
            let tracked = git.tracked_files().at(Stage::Validated)?;
            match_group(&tracked, id)
        }
    };
    if targets.is_empty() {
        return Err(EngineError::NothingToArchive {
            target: scope.label(),
        });
    }
    Ok(targets)
}

/// Shallowest paths among `files` that belong to `group`.
///
/// A path component belongs when it equals the group id or starts with it
/// followed by `_`, `-` or `.`. Everything under a matching directory is
/// covered by that directory, so `plan-7/notes.md` and `plan-7/todo.md`
/// collapse to `plan-7`.
pub fn match_group(files: &[PathBuf], group: &str) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    if group.is_empty() {
        return Vec::new();
    }
    for file in files {
        let mut prefix = PathBuf::new();
        for component in file.components() {
            let Component::Normal(name) = component else {
                continue;
            };
            prefix.push(name);
            if component_matches(&name.to_string_lossy(), group) {
                found.insert(prefix.clone());
                break;
            }
        }
    }
    // Drop entries nested under another match (can happen across files).
    let all: Vec<PathBuf> = found.into_iter().collect();
    all.iter()
        .filter(|p| !all.iter().any(|other| other != *p && p.starts_with(other)))
        .cloned()
        .collect()
}

fn component_matches(name: &str, group: &str) -> bool {
    match name.strip_prefix(group) {
        Some("") => true,
        Some(rest) => rest.starts_with(['_', '-', '.']),
        None => false,
    }
}

fn archive_message(
    config: &ChronicleConfig,
    scope: &ArchiveScope,
    targets: &[PathBuf],
    reason: &str,
) -> String {
    let mut message = match scope {
        ArchiveScope::Path(path) => {
            format!("Archive {} to {}", path.display(), config.archive_branch)
        }
        ArchiveScope::Group(id) => format!(
            "Archive group {id} ({} path(s)) to {}",
            targets.len(),
            config.archive_branch
        ),
    };
    if !reason.is_empty() {
        message.push_str(&format!(": {reason}"));
    }
    message.push_str("\n\n");
    for target in targets {
        message.push_str(&format!("- remove `{}`\n", target.display()));
    }
    message.push_str(&format!(
        "\nRetrieve with `git checkout {} -- <path>`.",
        config.archive_branch
    ));
    message
}

/// Repository-relative form of a user-supplied path.
///
/// Relative paths are taken relative to `cwd`. The result is lexically
/// normalized; `..` that would leave the repository yields `None`.
pub fn repo_relative(root: &Path, cwd: &Path, path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            other => normalized.push(other),
        }
    }
    let relative = normalized.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative.to_path_buf())
}
