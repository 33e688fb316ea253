mod common;

use std::path::PathBuf;

use chronicle_core::types::SyncStatus;
use chronicle_sync::archive::synchronize;
use chronicle_sync::pipeline::{self, ArchiveScope};
use chronicle_sync::{
    AbortReason, AssumeDefaults, CommitOptions, Decision, EngineError, PushPolicy, Question,
    RunStatus,
};

use common::{commit_file, git, write, Fixture};

fn no_push() -> CommitOptions {
    CommitOptions {
        message: None,
        push: PushPolicy::Never,
    }
}

#[test]
fn sync_is_idempotent() {
    let fx = Fixture::with_archive();
    commit_file(&fx.work, "docs/a.md", "a\n", "docs");
    let repo = fx.open();
    let main = fx.config.working_branch.clone();
    let archive = fx.config.archive_branch.clone();

    let first = synchronize(&repo, &main, &archive);
    assert_eq!(first.status, SyncStatus::Synchronized);
    assert!(first.new_commit.is_some());

    let second = synchronize(&repo, &main, &archive);
    assert_eq!(second.status, SyncStatus::Synchronized);
    assert!(second.new_commit.is_none());
    assert_eq!(fx.current_branch(), "main");
}

#[test]
fn sync_keeps_archive_only_paths() {
    let fx = Fixture::with_archive();
    git(&fx.work, &["checkout", "-q", "archive"]);
    commit_file(&fx.work, "old/legacy.md", "legacy\n", "legacy");
    git(&fx.work, &["checkout", "-q", "main"]);
    commit_file(&fx.work, "new.md", "new\n", "new");

    let repo = fx.open();
    let outcome = synchronize(&repo, &fx.config.working_branch, &fx.config.archive_branch);
    assert_eq!(outcome.status, SyncStatus::Synchronized);
    assert_eq!(git(&fx.work, &["show", "archive:old/legacy.md"]), "legacy");
    assert_eq!(git(&fx.work, &["show", "archive:new.md"]), "new");
    assert!(!fx.work.join("old").exists());
}

#[test]
fn archive_single_path() {
    let fx = Fixture::with_archive();
    commit_file(&fx.work, "docs/old.md", "old\n", "docs");
    let repo = fx.open();

    let report = pipeline::run(
        &repo,
        &fx.config,
        &ArchiveScope::Path(PathBuf::from("docs/old.md")),
        Some("superseded"),
        &no_push(),
        &mut AssumeDefaults,
    )
    .unwrap();

    assert_eq!(report.targets, vec![PathBuf::from("docs/old.md")]);
    assert_eq!(report.commit.status, RunStatus::Completed);
    assert!(!fx.work.join("docs/old.md").exists());
    assert_eq!(git(&fx.work, &["show", "archive:docs/old.md"]), "old");

    let index = std::fs::read_to_string(fx.work.join(&fx.config.archive_index_path)).unwrap();
    assert!(index.contains("| `docs/old.md` | superseded | `git checkout archive -- docs/old.md` |"));

    let entry = &fx.committed_ledger("HEAD").entries[0];
    assert!(entry
        .summary
        .starts_with("Archive docs/old.md to archive: superseded"));
    let tracked = git(&fx.work, &["ls-files"]);
    assert!(!tracked.contains("docs/old.md"));
    assert!(tracked.contains("project_management/archive_index.md"));
}

#[test]
fn archive_batch_collects_group() {
    let fx = Fixture::with_archive();
    commit_file(&fx.work, "plans/p7/a.md", "a\n", "a");
    commit_file(&fx.work, "plans/p7_notes.md", "n\n", "n");
    commit_file(&fx.work, "plans/p70.md", "other\n", "other");
    let repo = fx.open();

    let report = pipeline::run(
        &repo,
        &fx.config,
        &ArchiveScope::Group("p7".into()),
        None,
        &no_push(),
        &mut AssumeDefaults,
    )
    .unwrap();

    assert_eq!(
        report.targets,
        vec![PathBuf::from("plans/p7"), PathBuf::from("plans/p7_notes.md")]
    );
    assert!(!fx.work.join("plans/p7").exists());
    assert!(fx.work.join("plans/p70.md").exists());
    assert_eq!(git(&fx.work, &["show", "archive:plans/p7/a.md"]), "a");
}

#[test]
fn declined_archive_leaves_tree_untouched() {
    let fx = Fixture::with_archive();
    commit_file(&fx.work, "docs/old.md", "old\n", "docs");
    write(&fx.work, "scratch.txt", "wip\n");
    let archive_before = git(&fx.work, &["rev-parse", "archive"]);
    let head_before = fx.head();
    let repo = fx.open();

    let mut prompter = |q: &Question| match q {
        Question::IncludeUntracked { .. } => Decision::Decline,
        other => other.default_decision(),
    };
    let report = pipeline::run(
        &repo,
        &fx.config,
        &ArchiveScope::Path(PathBuf::from("docs/old.md")),
        Some("superseded"),
        &no_push(),
        &mut prompter,
    )
    .unwrap();

    assert_eq!(
        report.commit.status,
        RunStatus::Aborted {
            reason: AbortReason::UntrackedDeclined {
                files: vec![PathBuf::from("scratch.txt")]
            }
        }
    );
    assert_eq!(report.sync.status, SyncStatus::SkippedDeclined);
    assert!(fx.work.join("docs/old.md").exists());
    assert!(!fx.work.join(&fx.config.archive_index_path).exists());
    assert!(fx.staged_names().is_empty());
    assert_eq!(git(&fx.work, &["rev-parse", "archive"]), archive_before);
    assert_eq!(fx.head(), head_before);
    assert_eq!(fx.current_branch(), "main");
}

#[test]
fn archive_requires_archive_branch() {
    let fx = Fixture::new();
    commit_file(&fx.work, "docs/old.md", "old\n", "docs");
    let repo = fx.open();

    let err = pipeline::run(
        &repo,
        &fx.config,
        &ArchiveScope::Path(PathBuf::from("docs/old.md")),
        None,
        &no_push(),
        &mut AssumeDefaults,
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::ArchiveUnavailable { .. }), "got {err}");
    assert!(fx.work.join("docs/old.md").exists());
    assert!(fx.staged_names().is_empty());
}

#[test]
fn unknown_targets_are_rejected() {
    let fx = Fixture::with_archive();
    let repo = fx.open();
    for scope in [
        ArchiveScope::Path(PathBuf::from("missing.md")),
        ArchiveScope::Group("zzz".into()),
    ] {
        let err = pipeline::run(
            &repo,
            &fx.config,
            &scope,
            None,
            &no_push(),
            &mut AssumeDefaults,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NothingToArchive { .. }), "got {err}");
    }
}
