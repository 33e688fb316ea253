//! `chronicle commit` and `chronicle continue`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use chronicle_sync::{CommitEngine, CommitOptions, PushPolicy};

use super::{prompt, report};
use crate::GlobalArgs;

/// Flags shared by everything that ends in a commit.
#[derive(Args, Debug, Clone)]
pub struct CommitFlags {
    /// Answer yes to every question, pushing included.
    #[arg(short, long)]
    pub yes: bool,

    /// Push both branches without asking.
    #[arg(long, conflicts_with = "no_push")]
    pub push: bool,

    /// Never push.
    #[arg(long)]
    pub no_push: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl CommitFlags {
    pub fn options(&self, message: Option<String>) -> CommitOptions {
        let push = if self.push {
            PushPolicy::Always
        } else if self.no_push {
            PushPolicy::Never
        } else {
            PushPolicy::Ask
        };
        CommitOptions { message, push }
    }
}

#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Ledger summary and commit message (default: generated from the diff).
    #[arg(short, long)]
    pub message: Option<String>,

    #[command(flatten)]
    pub flags: CommitFlags,
}

impl CommitArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let git = global.open_repo()?;
        let (config, _) = global.load_config(&git)?;
        let mut prompter = prompt::select(self.flags.yes);

        let engine = CommitEngine::new(&git, &config);
        let result = engine
            .run(&self.flags.options(self.message.clone()), prompter.as_mut())
            .context("commit failed")?;

        if self.flags.json {
            report::print_json(&result)?;
        } else {
            report::print_commit_report(&result);
        }
        Ok(report::exit_code(&result))
    }
}

#[derive(Args, Debug)]
pub struct ContinueArgs {
    #[command(flatten)]
    pub flags: CommitFlags,
}

impl ContinueArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let git = global.open_repo()?;
        let (config, _) = global.load_config(&git)?;
        let mut prompter = prompt::select(self.flags.yes);

        let result = CommitEngine::new(&git, &config)
            .resume(&self.flags.options(None), prompter.as_mut())
            .context("continue failed")?;

        if self.flags.json {
            report::print_json(&result)?;
        } else {
            report::print_commit_report(&result);
        }
        Ok(report::exit_code(&result))
    }
}
