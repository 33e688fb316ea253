//! Retrieval index for content moved off the working branch.
//!
//! A Markdown table, one row per archived path, appended to by the archive
//! flows. Each row carries the command that brings the path back.

use std::path::{Path, PathBuf};

use crate::error::{ledger_io, LedgerError};
use crate::types::{BranchName, Timestamp};

const TABLE_HEADER: &str = "| Archived | Path | Reason | Retrieve |";
const TABLE_RULE: &str = "|---|---|---|---|";

/// One archived path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub archived_at: Timestamp,
    pub path: PathBuf,
    pub reason: String,
    pub archive_branch: BranchName,
}

impl ArchiveRecord {
    /// Works for files and directories alike.
    pub fn retrieval_command(&self) -> String {
        format!(
            "git checkout {} -- {}",
            self.archive_branch,
            self.path.display()
        )
    }

    fn row(&self) -> String {
        let reason = if self.reason.trim().is_empty() {
            "-".to_string()
        } else {
            escape_cell(&self.reason)
        };
        format!(
            "| {} | `{}` | {} | `{}` |",
            self.archived_at,
            self.path.display(),
            reason,
            self.retrieval_command()
        )
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Append `records` to the index at `path`, creating it with a title and
/// table header when missing.
///
/// Fails with [`LedgerError::Malformed`] if an existing file has no table
/// header to append under.
pub fn append_records(
    path: &Path,
    title: &str,
    records: &[ArchiveRecord],
) -> Result<(), LedgerError> {
    if records.is_empty() {
        return Ok(());
    }

    let mut text = if path.exists() {
        let existing = std::fs::read_to_string(path).map_err(|e| ledger_io(path, e))?;
        if !existing.lines().any(|l| l.trim() == TABLE_HEADER) {
            return Err(LedgerError::Malformed {
                path: path.to_path_buf(),
                line: existing.lines().count().max(1),
                message: format!("no `{TABLE_HEADER}` table header found"),
            });
        }
        existing
    } else {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| ledger_io(dir, e))?;
            }
        }
        format!("# {title}\n\n{TABLE_HEADER}\n{TABLE_RULE}\n")
    };

    if !text.ends_with('\n') {
        text.push('\n');
    }
    for record in records {
        text.push_str(&record.row());
        text.push('\n');
    }

    let tmp = path.with_extension("md.tmp");
    std::fs::write(&tmp, &text).map_err(|e| ledger_io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| ledger_io(path, e))?;
    Ok(())
}
