//! Human and JSON rendering of commit reports.

use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use chronicle_core::types::{SyncOutcome, SyncStatus};
use chronicle_sync::{CommitReport, Integration, Repair, RunStatus};

/// Exit status for a run that returned a report.
///
/// Replication failures do not change it: the commit itself succeeded.
pub fn exit_code(report: &CommitReport) -> ExitCode {
    match report.status {
        RunStatus::Completed | RunStatus::NothingToCommit => ExitCode::SUCCESS,
        RunStatus::ConflictPending { .. } => ExitCode::from(2),
        RunStatus::Aborted { .. } => ExitCode::from(3),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON")?
    );
    Ok(())
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "step")]
    step: &'static str,
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "detail")]
    detail: String,
}

pub fn print_commit_report(report: &CommitReport) {
    match &report.status {
        RunStatus::NothingToCommit => {
            println!("Nothing to commit.");
            return;
        }
        RunStatus::Aborted { reason } => {
            println!("{} aborted: {reason}", "✗".red());
            println!("  Nothing was committed.");
            return;
        }
        RunStatus::Completed | RunStatus::ConflictPending { .. } => {}
    }

    if let Some(repair) = &report.repair {
        match repair {
            Repair::HashAttached { entry, commit } => println!(
                "{} recovered hash {} for entry {entry}",
                "↺".yellow(),
                commit.short()
            ),
            Repair::DraftDiscarded { entry } => {
                println!("{} replaced uncommitted entry {entry}", "↺".yellow())
            }
        }
    }

    if let (Some(short), Some(entry)) = (report.short_commit(), &report.entry) {
        println!("{} committed {} (entry {entry})", "✓".green(), short.bold());
    }
    if let Some(summary) = report.summary.as_deref().and_then(|s| s.lines().next()) {
        println!("  {summary}");
    }

    match &report.integration {
        Some(Integration::Merged { merge_commit }) => println!(
            "  merged {} upstream commit(s) as {}",
            report.behind,
            merge_commit.short()
        ),
        Some(Integration::FastForwarded) => println!("  fast-forwarded to upstream"),
        Some(Integration::UpToDate) | None => {}
        Some(Integration::ConflictPending { .. }) => {}
    }

    if let RunStatus::ConflictPending { files } = &report.status {
        println!("{} merge from upstream stopped on conflicts:", "!".yellow().bold());
        for file in files {
            println!("    {}", file.display());
        }
        println!("  Resolve them, `git add` the files, then run `chronicle continue`.");
        return;
    }

    let rows: Vec<OutcomeRow> = report
        .archive
        .iter()
        .map(|o| outcome_row("archive sync", o))
        .chain(report.pushes.iter().map(|o| outcome_row("push", o)))
        .collect();
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for warning in &report.warnings {
        println!("{} {warning}", "warning:".yellow());
    }
}

fn outcome_row(step: &'static str, outcome: &SyncOutcome) -> OutcomeRow {
    let label = outcome.status.label();
    let result = match outcome.status {
        SyncStatus::Synchronized => label.green().to_string(),
        SyncStatus::SkippedNotFound | SyncStatus::SkippedDeclined => label.dimmed().to_string(),
        SyncStatus::Failed { .. } => label.red().to_string(),
    };
    let detail = match (&outcome.status, &outcome.new_commit) {
        (SyncStatus::Failed { message }, _) => first_line(message),
        (SyncStatus::SkippedNotFound, _) => "branch not found".to_string(),
        (SyncStatus::SkippedDeclined, _) => "not requested".to_string(),
        (SyncStatus::Synchronized, Some(commit)) => format!("new commit {}", commit.short()),
        (SyncStatus::Synchronized, None) if step == "push" => "pushed".to_string(),
        (SyncStatus::Synchronized, None) => "up to date".to_string(),
    };
    OutcomeRow {
        step,
        branch: outcome.branch.to_string(),
        result,
        detail,
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}
