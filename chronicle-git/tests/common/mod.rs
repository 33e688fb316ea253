#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

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

/// A working clone on `main` with one commit, pushed to a bare `origin`.
pub struct Fixture {
    _tmp: TempDir,
    pub remote: PathBuf,
    pub work: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
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
        }
    }

    /// A second clone of the remote, for producing upstream commits.
    pub fn clone_remote(&self, name: &str) -> PathBuf {
        let dir = self.remote.parent().unwrap().join(name);
        let parent = dir.parent().unwrap();
        git(
            parent,
            &["clone", "-q", self.remote.to_str().unwrap(), name],
        );
        configure(&dir);
        dir
    }
}
