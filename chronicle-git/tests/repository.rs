mod common;

use std::path::{Path, PathBuf};

use chronicle_core::types::{BranchName, ChangeKind};
use chronicle_git::{BranchGuard, Git, GitError};

use common::{commit_file, git, write, Fixture};

fn main_branch() -> BranchName {
    BranchName::from("main")
}

#[test]
fn open_resolves_root_from_subdirectory() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.work.join("nested/dir")).unwrap();
    let repo = Git::open(&fx.work.join("nested/dir")).expect("open");
    assert_eq!(
        repo.root().canonicalize().unwrap(),
        fx.work.canonicalize().unwrap()
    );
    assert!(repo.git_dir().ends_with(".git"));
}

#[test]
fn current_branch_and_existence() {
    let fx = Fixture::new();
    let repo = Git::open(&fx.work).unwrap();
    assert_eq!(repo.current_branch().unwrap(), main_branch());
    assert!(repo.branch_exists(&main_branch()).unwrap());
    assert!(!repo.branch_exists(&BranchName::from("archive")).unwrap());
}

#[test]
fn checkout_missing_branch_is_branch_not_found() {
    let fx = Fixture::new();
    let repo = Git::open(&fx.work).unwrap();
    let err = repo.checkout(&BranchName::from("nope")).unwrap_err();
    assert!(matches!(err, GitError::BranchNotFound { .. }), "got: {err}");
}

#[test]
fn detached_head_is_reported() {
    let fx = Fixture::new();
    git(&fx.work, &["checkout", "-q", "--detach"]);
    let repo = Git::open(&fx.work).unwrap();
    assert!(matches!(repo.current_branch(), Err(GitError::DetachedHead)));
}

#[test]
fn staged_diff_reports_kinds() {
    let fx = Fixture::new();
    let repo = Git::open(&fx.work).unwrap();
    commit_file(&fx.work, "old.txt", "old\n", "add old");

    write(&fx.work, "new.md", "new\n");
    write(&fx.work, "README.md", "# changed\n");
    std::fs::remove_file(fx.work.join("old.txt")).unwrap();
    assert_eq!(repo.untracked_files().unwrap(), vec![PathBuf::from("new.md")]);

    repo.stage_all().unwrap();
    let diff = repo.staged_diff().unwrap();
    assert_eq!(diff.files[Path::new("new.md")], ChangeKind::Added);
    assert_eq!(diff.files[Path::new("README.md")], ChangeKind::Modified);
    assert_eq!(diff.files[Path::new("old.txt")], ChangeKind::Deleted);
    assert!(repo.has_staged_changes().unwrap());
}

#[test]
fn unstage_path_keeps_working_tree_change() {
    let fx = Fixture::new();
    let repo = Git::open(&fx.work).unwrap();
    write(&fx.work, "README.md", "# edited\n");
    repo.stage_all().unwrap();
    repo.unstage_path(Path::new("README.md")).unwrap();
    assert!(!repo.has_staged_changes().unwrap());
    assert_eq!(
        std::fs::read_to_string(fx.work.join("README.md")).unwrap(),
        "# edited\n"
    );
}

#[test]
fn commit_returns_head_hash() {
    let fx = Fixture::new();
    let repo = Git::open(&fx.work).unwrap();
    write(&fx.work, "a.txt", "a\n");
    repo.stage_all().unwrap();
    let hash = repo.commit("add a").unwrap();
    assert_eq!(hash, repo.head_hash().unwrap());
    assert_eq!(hash.as_str(), git(&fx.work, &["rev-parse", "HEAD"]));
    assert!(repo.commit_exists(&hash).unwrap());
}

#[test]
fn commit_introducing_finds_oldest_match() {
    let fx = Fixture::new();
    let repo = Git::open(&fx.work).unwrap();
    commit_file(&fx.work, "log.md", "# Log\n\n## marker-1\n", "introduce");
    let introducing = repo.head_hash().unwrap();
    commit_file(
        &fx.work,
        "log.md",
        "# Log\n\n## marker-1 | Hash: x\n",
        "annotate",
    );
    let found = repo
        .commit_introducing(Path::new("log.md"), "## marker-1")
        .unwrap();
    assert_eq!(found, Some(introducing));
    assert_eq!(
        repo.commit_introducing(Path::new("log.md"), "## absent")
            .unwrap(),
        None
    );
}

#[test]
fn divergence_counts_remote_only_commits() {
    let fx = Fixture::new();
    let other = fx.clone_remote("other");
    for i in 0..3 {
        commit_file(&other, &format!("up{i}.txt"), "x\n", "upstream");
    }
    git(&other, &["push", "-q", "origin", "main"]);

    let repo = Git::open(&fx.work).unwrap();
    repo.fetch("origin").unwrap();
    let remote_ref = Git::remote_tracking_ref("origin", &main_branch());
    assert_eq!(repo.divergence_count("main", &remote_ref).unwrap(), 3);
    assert_eq!(
        repo.divergence_count("main", "refs/remotes/origin/missing")
            .unwrap(),
        0
    );
}

#[test]
fn fetch_from_unknown_remote_is_network_error() {
    let fx = Fixture::new();
    let repo = Git::open(&fx.work).unwrap();
    git(
        &fx.work,
        &["remote", "add", "broken", "/nonexistent/chronicle/remote.git"],
    );
    assert!(matches!(
        repo.fetch("broken"),
        Err(GitError::Network { .. })
    ));
}

#[test]
fn pull_conflict_lists_files() {
    let fx = Fixture::new();
    let other = fx.clone_remote("other");
    commit_file(&other, "README.md", "# theirs\n", "theirs");
    git(&other, &["push", "-q", "origin", "main"]);

    commit_file(&fx.work, "README.md", "# ours\n", "ours");
    let repo = Git::open(&fx.work).unwrap();
    let err = repo.pull("origin", &main_branch()).unwrap_err();
    match err {
        GitError::MergeConflict { files } => {
            assert_eq!(files, vec![PathBuf::from("README.md")]);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(repo.merge_in_progress().unwrap());
}

#[test]
fn stash_round_trip_preserves_index() {
    let fx = Fixture::new();
    let repo = Git::open(&fx.work).unwrap();
    assert!(!repo.stash().unwrap(), "clean tree has nothing to stash");

    write(&fx.work, "README.md", "# staged\n");
    repo.stage_all().unwrap();
    write(&fx.work, "scratch.txt", "untracked\n");
    assert!(repo.stash().unwrap());
    assert!(!fx.work.join("scratch.txt").exists());

    repo.stash_pop().unwrap();
    assert!(fx.work.join("scratch.txt").exists());
    assert!(repo.staged_diff().unwrap().contains(Path::new("README.md")));
}

#[test]
fn guard_restores_branch_on_drop() {
    let fx = Fixture::new();
    git(&fx.work, &["branch", "archive"]);
    let repo = Git::open(&fx.work).unwrap();
    {
        let guard = BranchGuard::acquire(&repo).unwrap();
        assert_eq!(guard.original(), &main_branch());
        repo.checkout(&BranchName::from("archive")).unwrap();
        assert_eq!(repo.current_branch().unwrap(), BranchName::from("archive"));
    }
    assert_eq!(repo.current_branch().unwrap(), main_branch());
}

#[test]
fn guard_release_is_explicit_restore() {
    let fx = Fixture::new();
    git(&fx.work, &["branch", "archive"]);
    let repo = Git::open(&fx.work).unwrap();
    let guard = BranchGuard::acquire(&repo).unwrap();
    repo.checkout(&BranchName::from("archive")).unwrap();
    guard.release().unwrap();
    assert_eq!(repo.current_branch().unwrap(), main_branch());
}

#[test]
#[cfg(unix)]
fn push_rejected_by_server_hook() {
    let fx = Fixture::new();
    let hook = fx.remote.join("hooks").join("pre-receive");
    std::fs::write(&hook, "#!/bin/sh\necho 'denied: read-only' >&2\nexit 1\n").unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    commit_file(&fx.work, "b.txt", "b\n", "b");
    let repo = Git::open(&fx.work).unwrap();
    match repo.push("origin", &main_branch()).unwrap_err() {
        GitError::PushRejected { branch, reason } => {
            assert_eq!(branch, "main");
            assert!(reason.contains("denied"), "reason: {reason}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn remove_path_and_tracking() {
    let fx = Fixture::new();
    commit_file(&fx.work, "docs/old/a.md", "a\n", "docs");
    let repo = Git::open(&fx.work).unwrap();
    assert!(repo.is_tracked(Path::new("docs/old")).unwrap());
    repo.remove_path(Path::new("docs/old")).unwrap();
    assert!(!fx.work.join("docs/old/a.md").exists());
    assert!(!repo.is_tracked(Path::new("docs/old")).unwrap());
    assert!(repo
        .tracked_files()
        .unwrap()
        .contains(&PathBuf::from("README.md")));
}
