//! `chronicle status` — branch, ledger and pending-merge visibility.

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use chronicle_core::config::ConfigSource;
use chronicle_sync::status::{self, RepoStatus};

use super::report;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson<'a> {
    config_source: String,
    #[serde(flatten)]
    status: &'a RepoStatus,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "item")]
    item: &'static str,
    #[tabled(rename = "state")]
    state: String,
}

impl StatusArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let git = global.open_repo()?;
        let (config, source) = global.load_config(&git)?;
        let snapshot = status::collect(&git, &config).context("status check failed")?;

        if self.json {
            report::print_json(&StatusJson {
                config_source: source.to_string(),
                status: &snapshot,
            })?;
            return Ok(ExitCode::SUCCESS);
        }

        print_table(&snapshot, &source);
        Ok(ExitCode::SUCCESS)
    }
}

fn print_table(status: &RepoStatus, source: &ConfigSource) {
    println!("Chronicle v{} | config: {source}", env!("CARGO_PKG_VERSION"));

    let branch = match &status.current_branch {
        Some(b) if status.on_working_branch => b.to_string().green().to_string(),
        Some(b) => format!("{} (expected {})", b.to_string().yellow(), status.working_branch),
        None => "detached HEAD".red().to_string(),
    };
    let archive = if status.archive_exists {
        status.archive_branch.to_string()
    } else {
        format!("{} (missing, sync skipped)", status.archive_branch)
            .dimmed()
            .to_string()
    };
    let upstream = match status.behind {
        0 => "up to date (as of last fetch)".to_string(),
        n => format!("{n} commit(s) behind").yellow().to_string(),
    };
    let ledger = match &status.newest_entry {
        None => "no entries".dimmed().to_string(),
        Some(entry) => {
            let hash = match &entry.commit_hash {
                Some(h) => h.short().to_string(),
                None => "hash pending".yellow().to_string(),
            };
            format!("{} ({}, {hash})", entry.timestamp, age(entry.timestamp.datetime()))
        }
    };

    let mut rows = vec![
        StatusRow {
            item: "branch",
            state: branch,
        },
        StatusRow {
            item: "archive",
            state: archive,
        },
        StatusRow {
            item: "upstream",
            state: upstream,
        },
        StatusRow {
            item: "staged",
            state: format!("{} file(s)", status.staged_files),
        },
        StatusRow {
            item: "untracked",
            state: format!("{} file(s)", status.untracked_files),
        },
        StatusRow {
            item: "newest entry",
            state: ledger,
        },
    ];
    if let Some(pending) = &status.pending_merge {
        rows.push(StatusRow {
            item: "pending merge",
            state: format!(
                "commit {} waiting since {}",
                pending.commit.short(),
                pending.started_at.to_rfc3339()
            )
            .red()
            .to_string(),
        });
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if status.pending_merge.is_some() {
        println!("Resolve conflicts, `git add` them, then run `chronicle continue`.");
    }
}

fn age(at: chrono::DateTime<chrono::FixedOffset>) -> String {
    let seconds = Utc::now().signed_duration_since(at).num_seconds().max(0);
    match seconds {
        s if s < 60 => "just now".to_string(),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}
