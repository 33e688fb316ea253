#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use chronicle_core::{ChronicleConfig, LedgerDocument};
use chronicle_git::Git;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run git in `dir`, asserting success; returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("LC_ALL", "C")
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn configure(dir: &Path) {
    git(dir, &["config", "user.name", "Chronicle Test"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

pub fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, content).expect("write file");
}

pub fn commit_file(dir: &Path, rel: &str, content: &str, message: &str) {
    write(dir, rel, content);
    git(dir, &["add", "--", rel]);
    git(dir, &["commit", "-q", "-m", message]);
}

/// Install an executable hook script.
#[cfg(unix)]
pub fn install_hook(hooks_dir: &Path, name: &str, script: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::create_dir_all(hooks_dir).unwrap();
    let path = hooks_dir.join(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// A working clone on `main` with one commit, pushed to a bare `origin`.
pub struct Fixture {
    _tmp: TempDir,
    pub remote: PathBuf,
    pub work: PathBuf,
    pub config: ChronicleConfig,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        let tmp = TempDir::new().expect("tempdir");
        let remote = tmp.path().join("remote.git");
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&remote).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        git(&remote, &["init", "-q", "--bare", "-b", "main"]);
        git(&work, &["init", "-q", "-b", "main"]);
        configure(&work);
        git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
        commit_file(&work, "README.md", "# project\n", "initial");
        git(&work, &["push", "-q", "-u", "origin", "main"]);

        Self {
            _tmp: tmp,
            remote,
            work,
            config: ChronicleConfig::default(),
        }
    }

    /// Same, plus a local `archive` branch at the initial commit.
    pub fn with_archive() -> Self {
        let fx = Self::new();
        git(&fx.work, &["branch", "archive"]);
        fx
    }

    pub fn open(&self) -> Git {
        Git::open(&self.work).expect("open work repo")
    }

    /// A second clone of the remote, for producing upstream commits.
    pub fn clone_remote(&self, name: &str) -> PathBuf {
        let dir = self.remote.parent().unwrap().join(name);
        let parent = dir.parent().unwrap();
        git(parent, &["clone", "-q", self.remote.to_str().unwrap(), name]);
        configure(&dir);
        dir
    }

    /// Commit and push `rel` from a fresh clone, putting `origin/main` ahead.
    pub fn upstream_commit(&self, clone: &str, rel: &str, content: &str) {
        let dir = self.clone_remote(clone);
        commit_file(&dir, rel, content, &format!("upstream {rel}"));
        git(&dir, &["push", "-q", "origin", "main"]);
    }

    pub fn ledger_rel(&self) -> &str {
        self.config.ledger_path.to_str().unwrap()
    }

    /// Ledger as it is in the working tree.
    pub fn ledger(&self) -> LedgerDocument {
        let path = self.work.join(&self.config.ledger_path);
        let text = std::fs::read_to_string(&path).expect("ledger exists");
        LedgerDocument::parse(&text, &path).expect("ledger parses")
    }

    /// Ledger as committed at `rev`.
    pub fn committed_ledger(&self, rev: &str) -> LedgerDocument {
        let spec = format!("{rev}:{}", self.ledger_rel());
        let text = git(&self.work, &["show", &spec]);
        LedgerDocument::parse(&format!("{text}\n"), Path::new(&spec)).expect("ledger parses")
    }

    pub fn head(&self) -> String {
        git(&self.work, &["rev-parse", "HEAD"])
    }

    pub fn current_branch(&self) -> String {
        git(&self.work, &["symbolic-ref", "--short", "HEAD"])
    }

    pub fn staged_names(&self) -> Vec<String> {
        git(&self.work, &["diff", "--cached", "--name-only"])
            .lines()
            .map(str::to_string)
            .collect()
    }
}
