//! `chronicle archive` and `chronicle archive-batch`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use chronicle_git::Git;
use chronicle_sync::pipeline::{self, ArchiveReport, ArchiveScope};
use chronicle_sync::RunStatus;

use super::commit::CommitFlags;
use super::{prompt, report};
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Tracked file or directory to move to the archive branch.
    pub path: PathBuf,

    /// Recorded in the archive index.
    pub reason: Option<String>,

    #[command(flatten)]
    pub flags: CommitFlags,
}

impl ArchiveArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let git = global.open_repo()?;
        let start = global.start_dir()?.canonicalize().context("cannot resolve start directory")?;
        let root = git.root().canonicalize().context("cannot resolve repository root")?;
        let path = if self.path.is_absolute() {
            self.path.canonicalize().unwrap_or_else(|_| self.path.clone())
        } else {
            self.path.clone()
        };
        let relative = pipeline::repo_relative(&root, &start, &path).with_context(|| {
            format!("'{}' is not inside the repository", self.path.display())
        })?;

        run_scope(
            global,
            &git,
            ArchiveScope::Path(relative),
            self.reason.as_deref(),
            &self.flags,
        )
    }
}

#[derive(Args, Debug)]
pub struct ArchiveBatchArgs {
    /// Group id; matches path components equal to it or starting with it
    /// followed by `_`, `-` or `.`.
    pub group: String,

    /// Recorded in the archive index.
    pub reason: Option<String>,

    #[command(flatten)]
    pub flags: CommitFlags,
}

impl ArchiveBatchArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let git = global.open_repo()?;
        run_scope(
            global,
            &git,
            ArchiveScope::Group(self.group.clone()),
            self.reason.as_deref(),
            &self.flags,
        )
    }
}

fn run_scope(
    global: &GlobalArgs,
    git: &Git,
    scope: ArchiveScope,
    reason: Option<&str>,
    flags: &CommitFlags,
) -> Result<ExitCode> {
    let (config, _) = global.load_config(git)?;
    let mut prompter = prompt::select(flags.yes);

    let result = pipeline::run(
        git,
        &config,
        &scope,
        reason,
        &flags.options(None),
        prompter.as_mut(),
    )
    .context("archive failed")?;

    if flags.json {
        report::print_json(&result)?;
    } else {
        print_archive_report(&result);
    }
    Ok(report::exit_code(&result.commit))
}

fn print_archive_report(result: &ArchiveReport) {
    let count = result.targets.len();
    let branch = &result.sync.branch;
    match &result.commit.status {
        RunStatus::Completed | RunStatus::NothingToCommit => {
            println!("{} archived {count} path(s) to {branch}", "✓".green())
        }
        RunStatus::ConflictPending { .. } => println!(
            "{} archived {count} path(s) to {branch}; removal committed, merge unfinished",
            "!".yellow().bold()
        ),
        RunStatus::Aborted { .. } => {
            println!("{} archive of {count} path(s) not performed", "✗".red())
        }
    }
    for target in &result.targets {
        println!("  {}", target.display());
    }
    report::print_commit_report(&result.commit);
}
