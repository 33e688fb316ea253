//! `git` subprocess adapter.
//!
//! Every call runs `git` in the repository root with `LC_ALL=C` (stable,
//! parseable messages) and `GIT_TERMINAL_PROMPT=0` (a missing credential fails
//! instead of blocking on a prompt).

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chronicle_core::types::{BranchName, ChangeKind, CommitHash, StagedChangeSet};

use crate::error::GitError;

const STASH_MESSAGE: &str = "chronicle: archive sync";

/// Handle on a working tree.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
    git_dir: PathBuf,
}

impl Git {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["rev-parse", "--show-toplevel", "--absolute-git-dir"])
            .env("LC_ALL", "C")
            .output()
            .map_err(GitError::Spawn)?;
        if !output.status.success() {
            return Err(GitError::NotARepository {
                path: path.to_path_buf(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        match (lines.next(), lines.next()) {
            (Some(root), Some(git_dir)) if !root.is_empty() => Ok(Self {
                root: PathBuf::from(root),
                git_dir: PathBuf::from(git_dir),
            }),
            // Bare repositories print no toplevel.
            _ => Err(GitError::NotARepository {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn is_repository(path: &Path) -> bool {
        Self::open(path).is_ok()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    // -----------------------------------------------------------------------
    // Branches and refs
    // -----------------------------------------------------------------------

    pub fn current_branch(&self) -> Result<BranchName, GitError> {
        let output = self.output(["symbolic-ref", "-q", "--short", "HEAD"])?;
        if !output.status.success() {
            return Err(GitError::DetachedHead);
        }
        Ok(BranchName::from(stdout_trimmed(&output)))
    }

    pub fn branch_exists(&self, branch: &BranchName) -> Result<bool, GitError> {
        self.ref_exists(&format!("refs/heads/{branch}"))
    }

    pub fn ref_exists(&self, refname: &str) -> Result<bool, GitError> {
        self.succeeds(["rev-parse", "-q", "--verify", refname])
    }

    /// `refs/remotes/<remote>/<branch>`
    pub fn remote_tracking_ref(remote: &str, branch: &BranchName) -> String {
        format!("refs/remotes/{remote}/{branch}")
    }

    pub fn create_branch(&self, branch: &BranchName) -> Result<(), GitError> {
        self.run(["branch", branch.as_str()]).map(drop)
    }

    pub fn checkout(&self, branch: &BranchName) -> Result<(), GitError> {
        if !self.branch_exists(branch)? {
            return Err(GitError::BranchNotFound {
                branch: branch.0.clone(),
            });
        }
        tracing::debug!("checkout {branch}");
        self.run(["checkout", "-q", branch.as_str()]).map(drop)
    }

    /// Replace the index and working tree with `branch`'s full tree
    /// (`git checkout <branch> -- .`). Paths absent from `branch` are left alone.
    pub fn checkout_tree_from(&self, branch: &BranchName) -> Result<(), GitError> {
        self.run(["checkout", branch.as_str(), "--", "."]).map(drop)
    }

    /// Discard index and working-tree changes on the current branch.
    pub fn reset_hard(&self) -> Result<(), GitError> {
        self.run(["reset", "-q", "--hard", "HEAD"]).map(drop)
    }

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    pub fn has_commits(&self) -> Result<bool, GitError> {
        self.ref_exists("HEAD")
    }

    pub fn head_hash(&self) -> Result<CommitHash, GitError> {
        let args = ["rev-parse", "--verify", "HEAD"];
        let out = self.run(args)?;
        parse_hash(&args, out.trim())
    }

    pub fn resolve(&self, rev: &str) -> Result<Option<CommitHash>, GitError> {
        let spec = format!("{rev}^{{commit}}");
        let output = self.output(["rev-parse", "-q", "--verify", spec.as_str()])?;
        if !output.status.success() {
            return Ok(None);
        }
        parse_hash(&["rev-parse", spec.as_str()], &stdout_trimmed(&output)).map(Some)
    }

    pub fn commit_exists(&self, hash: &CommitHash) -> Result<bool, GitError> {
        let spec = format!("{hash}^{{commit}}");
        self.succeeds(["cat-file", "-e", spec.as_str()])
    }

    pub fn commit(&self, message: &str) -> Result<CommitHash, GitError> {
        self.run(["commit", "-q", "-m", message])?;
        self.head_hash()
    }

    /// Conclude an in-progress merge with git's prepared message.
    pub fn commit_merge(&self) -> Result<CommitHash, GitError> {
        self.run(["commit", "-q", "--no-edit"])?;
        self.head_hash()
    }

    pub fn parent_count(&self, rev: &str) -> Result<usize, GitError> {
        let out = self.run(["rev-list", "--parents", "-n", "1", rev])?;
        Ok(out.split_whitespace().count().saturating_sub(1))
    }

    /// Oldest commit touching `path` whose diff changes the number of
    /// occurrences of `needle` (`git log -S`), i.e. the commit that introduced it.
    pub fn commit_introducing(
        &self,
        path: &Path,
        needle: &str,
    ) -> Result<Option<CommitHash>, GitError> {
        if !self.has_commits()? {
            return Ok(None);
        }
        let args: Vec<OsString> = vec![
            "log".into(),
            "--format=%H".into(),
            format!("-S{needle}").into(),
            "--".into(),
            path.as_os_str().to_owned(),
        ];
        let out = self.run(&args)?;
        match out.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => parse_hash(&["log", "-S"], line.trim()).map(Some),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Index and working tree
    // -----------------------------------------------------------------------

    pub fn staged_diff(&self) -> Result<StagedChangeSet, GitError> {
        let out = self.run(["diff", "--cached", "--name-status", "--no-renames", "-z"])?;
        Ok(parse_name_status(&out))
    }

    pub fn has_staged_changes(&self) -> Result<bool, GitError> {
        let output = self.output(["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(command_error(&["diff", "--cached", "--quiet"], &output)),
        }
    }

    pub fn untracked_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let out = self.run(["ls-files", "--others", "--exclude-standard", "-z"])?;
        Ok(split_z(&out).map(PathBuf::from).collect())
    }

    pub fn tracked_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let out = self.run(["ls-files", "-z"])?;
        Ok(split_z(&out).map(PathBuf::from).collect())
    }

    pub fn is_tracked(&self, path: &Path) -> Result<bool, GitError> {
        self.succeeds(with_path(&["ls-files", "--error-unmatch", "--"], path))
    }

    pub fn conflicted_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let out = self.run(["diff", "--name-only", "--diff-filter=U", "-z"])?;
        Ok(split_z(&out).map(PathBuf::from).collect())
    }

    pub fn merge_in_progress(&self) -> Result<bool, GitError> {
        self.ref_exists("MERGE_HEAD")
    }

    pub fn stage_all(&self) -> Result<(), GitError> {
        self.run(["add", "-A"]).map(drop)
    }

    pub fn stage_path(&self, path: &Path) -> Result<(), GitError> {
        self.run(with_path(&["add", "--"], path)).map(drop)
    }

    pub fn unstage_path(&self, path: &Path) -> Result<(), GitError> {
        if self.has_commits()? {
            self.run(with_path(&["reset", "-q", "HEAD", "--"], path))
                .map(drop)
        } else {
            self.run(with_path(
                &["rm", "-q", "--cached", "--ignore-unmatch", "--"],
                path,
            ))
            .map(drop)
        }
    }

    /// `git rm -r`: removes from index and working tree.
    pub fn remove_path(&self, path: &Path) -> Result<(), GitError> {
        self.run(with_path(&["rm", "-r", "-q", "--"], path)).map(drop)
    }

    /// Stash uncommitted state, untracked files included. Returns `false` when
    /// there was nothing to stash.
    pub fn stash(&self) -> Result<bool, GitError> {
        let before = self.resolve("refs/stash")?;
        self.run([
            "stash",
            "push",
            "--include-untracked",
            "-q",
            "-m",
            STASH_MESSAGE,
        ])?;
        let after = self.resolve("refs/stash")?;
        Ok(after.is_some() && after != before)
    }

    /// Re-apply the most recent stash, restoring the index too.
    pub fn stash_pop(&self) -> Result<(), GitError> {
        self.run(["stash", "pop", "--index", "-q"]).map(drop)
    }

    // -----------------------------------------------------------------------
    // Remote
    // -----------------------------------------------------------------------

    pub fn remote_exists(&self, remote: &str) -> Result<bool, GitError> {
        self.succeeds(["remote", "get-url", remote])
    }

    pub fn fetch(&self, remote: &str) -> Result<(), GitError> {
        let output = self.output(["fetch", "-q", remote])?;
        if output.status.success() {
            return Ok(());
        }
        Err(GitError::Network {
            remote: remote.to_string(),
            message: stderr_summary(&output),
        })
    }

    /// Commits on `remote_ref` not reachable from `local`.
    pub fn divergence_count(&self, local: &str, remote_ref: &str) -> Result<usize, GitError> {
        if !self.ref_exists(remote_ref)? {
            return Ok(0);
        }
        let range = if self.ref_exists(local)? {
            format!("{local}..{remote_ref}")
        } else {
            remote_ref.to_string()
        };
        let args = ["rev-list", "--count", range.as_str()];
        let out = self.run(args)?;
        out.trim()
            .parse()
            .map_err(|_| GitError::UnexpectedOutput {
                args: args.join(" "),
                output: out.trim().to_string(),
            })
    }

    /// `git pull --no-rebase --no-edit <remote> <branch>`.
    pub fn pull(&self, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        let args = ["pull", "--no-rebase", "--no-edit", "-q", remote, branch.as_str()];
        let output = self.output(args)?;
        if output.status.success() {
            return Ok(());
        }
        let files = self.conflicted_files()?;
        if !files.is_empty() {
            return Err(GitError::MergeConflict { files });
        }
        Err(command_error(&args, &output))
    }

    pub fn push(&self, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        let output = self.output(["push", "-q", remote, branch.as_str()])?;
        if output.status.success() {
            return Ok(());
        }
        Err(GitError::PushRejected {
            branch: branch.0.clone(),
            reason: stderr_summary(&output),
        })
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.root)
            .args(args)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn output<I, S>(&self, args: I) -> Result<Output, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command(args).output().map_err(GitError::Spawn)
    }

    fn succeeds<I, S>(&self, args: I) -> Result<bool, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Ok(self.output(args)?.status.success())
    }

    /// Run and require success; returns stdout.
    fn run<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let output = self.output(&args)?;
        if !output.status.success() {
            let printable: Vec<String> = args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            let printable: Vec<&str> = printable.iter().map(String::as_str).collect();
            return Err(command_error(&printable, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse `git diff --name-status -z` output (`<status>\0<path>\0…`).
pub fn parse_name_status(raw: &str) -> StagedChangeSet {
    let mut set = StagedChangeSet::default();
    let mut tokens = split_z(raw);
    while let (Some(status), Some(path)) = (tokens.next(), tokens.next()) {
        // Unmerged (`U`) and anything unexpected is reported as a modification.
        let kind = status
            .chars()
            .next()
            .and_then(ChangeKind::from_status_letter)
            .unwrap_or(ChangeKind::Modified);
        set.insert(path, kind);
    }
    set
}

fn split_z(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\0').filter(|s| !s.is_empty())
}

fn with_path(args: &[&str], path: &Path) -> Vec<OsString> {
    let mut v: Vec<OsString> = args.iter().map(OsString::from).collect();
    v.push(path.as_os_str().to_owned());
    v
}

fn parse_hash(args: &[&str], raw: &str) -> Result<CommitHash, GitError> {
    CommitHash::parse(raw).map_err(|_| GitError::UnexpectedOutput {
        args: args.join(" "),
        output: raw.to_string(),
    })
}

fn stdout_trimmed(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// First few non-empty stderr lines, joined.
fn stderr_summary(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(4)
        .collect();
    if lines.is_empty() {
        format!("exit status {}", output.status)
    } else {
        lines.join("; ")
    }
}

fn command_error(args: &[&str], output: &Output) -> GitError {
    GitError::Command {
        args: args.join(" "),
        stderr: stderr_summary(output),
    }
}
