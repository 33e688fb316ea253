//! Chronicle: ledger-backed commits with archive-branch replication.
//!
//! # Usage
//!
//! ```text
//! chronicle init [--create-archive]
//! chronicle commit [-m <summary>] [--yes] [--push|--no-push] [--json]
//! chronicle continue [--push|--no-push] [--json]
//! chronicle archive <path> [reason] [--json]
//! chronicle archive-batch <group-id> [reason] [--json]
//! chronicle status [--json]
//! chronicle verify [--json]
//! ```
//!
//! Global flags: `-C <repo>`, `--config <file>`, `--working-branch`,
//! `--archive-branch`, `--remote`, `-v`/`-vv`.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;

use chronicle_core::config::{self, ConfigSource};
use chronicle_core::types::BranchName;
use chronicle_core::ChronicleConfig;
use chronicle_git::Git;
use chronicle_sync::EngineError;

use commands::{
    archive::{ArchiveArgs, ArchiveBatchArgs},
    commit::{CommitArgs, ContinueArgs},
    init::InitArgs,
    status::StatusArgs,
    verify::VerifyArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "chronicle",
    version,
    about = "Commit with a change-history ledger and keep an archive branch in step",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default .chronicle.yaml and an empty ledger.
    Init(InitArgs),

    /// Stage everything, record a ledger entry, commit, sync, push.
    Commit(CommitArgs),

    /// Finish a commit run that stopped on a merge conflict.
    Continue(ContinueArgs),

    /// Move one path to the archive branch and commit its removal.
    Archive(ArchiveArgs),

    /// Move every path belonging to a group id to the archive branch.
    ArchiveBatch(ArchiveBatchArgs),

    /// Show branch, ledger and pending-merge state.
    Status(StatusArgs),

    /// Check the ledger for ordering and hash problems.
    Verify(VerifyArgs),
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Run as if started in this directory.
    #[arg(short = 'C', long = "repo", global = true, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Config file to use instead of the usual lookup.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "BRANCH")]
    pub working_branch: Option<String>,

    #[arg(long, global = true, value_name = "BRANCH")]
    pub archive_branch: Option<String>,

    #[arg(long, global = true, value_name = "NAME")]
    pub remote: Option<String>,

    /// More log output on stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalArgs {
    pub fn start_dir(&self) -> Result<PathBuf> {
        match &self.repo {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().context("could not determine current directory"),
        }
    }

    pub fn open_repo(&self) -> Result<Git> {
        let start = self.start_dir()?;
        Git::open(&start).with_context(|| format!("cannot use '{}'", start.display()))
    }

    /// Resolve config for `git`'s repository and apply command-line overrides.
    pub fn load_config(&self, git: &Git) -> Result<(ChronicleConfig, ConfigSource)> {
        let (mut config, source) = config::resolve(git.root(), self.config.as_deref())
            .context("failed to load configuration")?;
        self.apply_overrides(&mut config);
        config.validate().context("invalid configuration")?;
        tracing::debug!("configuration from {source}");
        Ok((config, source))
    }

    pub fn apply_overrides(&self, config: &mut ChronicleConfig) {
        if let Some(branch) = &self.working_branch {
            config.working_branch = BranchName::from(branch.as_str());
        }
        if let Some(branch) = &self.archive_branch {
            config.archive_branch = BranchName::from(branch.as_str());
        }
        if let Some(remote) = &self.remote {
            config.remote = remote.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// stderr subscriber. `RUST_LOG` wins; otherwise `-v` picks the level.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let global = cli.global;
    let result = match cli.command {
        Commands::Init(args) => args.run(&global),
        Commands::Commit(args) => args.run(&global),
        Commands::Continue(args) => args.run(&global),
        Commands::Archive(args) => args.run(&global),
        Commands::ArchiveBatch(args) => args.run(&global),
        Commands::Status(args) => args.run(&global),
        Commands::Verify(args) => args.run(&global),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn print_error(err: &anyhow::Error) {
    eprintln!("{} {err:#}", "error:".red().bold());
    if let Some(engine) = err.chain().find_map(|e| e.downcast_ref::<EngineError>()) {
        eprintln!("  {} {}", "stage:".bold(), engine.stage());
        eprintln!("  {} {}", "fix:".bold(), engine.remedy());
    }
}
