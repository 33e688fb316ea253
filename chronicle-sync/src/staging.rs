//! Summary and subject generation for a staged change set.

use std::path::Path;

use chronicle_core::types::{ChangeKind, StagedChangeSet};
use chronicle_core::ChronicleConfig;

/// Files listed individually in a generated summary before collapsing.
const MAX_LISTED_FILES: usize = 40;

/// Summary used when the only staged change is the ledger itself (a pending
/// hash from the previous run).
pub const HASH_ONLY_SUMMARY: &str = "Record commit hash for the previous change-history entry.";

const TRUNCATION_MARKER: &str = "[...]";

/// Hard cap on a full commit message, subject and body together. The ledger
/// entry keeps the complete summary.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Text written into the ledger entry plus the commit subject derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub summary: String,
    pub subject: String,
}

impl Draft {
    /// Subject line, then the summary as body when it says more.
    ///
    /// The result never exceeds [`MAX_MESSAGE_CHARS`]: a long body is cut at
    /// a line boundary and ends with `[...]`.
    pub fn commit_message(&self) -> String {
        let summary = self.summary.trim();
        let body = match summary.split_once('\n') {
            Some((first, rest)) if first.trim() == self.subject => rest.trim(),
            None if summary == self.subject => "",
            _ => summary,
        };
        if body.is_empty() {
            return self.subject.clone();
        }
        let full = format!("{}\n\n{body}", self.subject);
        if full.chars().count() <= MAX_MESSAGE_CHARS {
            return full;
        }

        let overhead = self.subject.chars().count() + 2 + TRUNCATION_MARKER.len();
        let budget = MAX_MESSAGE_CHARS.saturating_sub(overhead);
        let mut kept = Vec::new();
        let mut used = 0;
        for line in body.lines() {
            let cost = line.chars().count() + 1;
            if used + cost > budget {
                break;
            }
            used += cost;
            kept.push(line);
        }
        while kept.last().is_some_and(|l| l.trim().is_empty()) {
            kept.pop();
        }

        let mut out = format!("{}\n\n", self.subject);
        for line in kept {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(TRUNCATION_MARKER);
        out
    }
}

/// Build the ledger summary and commit subject for `changes`.
///
/// `ledger` (repository-relative) is excluded from the listing. A custom
/// `message` replaces the generated text but is still word-bounded.
pub fn draft(
    changes: &StagedChangeSet,
    ledger: &Path,
    message: Option<&str>,
    config: &ChronicleConfig,
) -> Draft {
    let summary = match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(custom) => custom.to_string(),
        None => describe(&changes.without(ledger)),
    };
    let summary = truncate_words(&summary, config.summary_word_limit);
    let subject = subject_line(&summary, config.subject_max_chars);
    Draft { summary, subject }
}

/// Deterministic description of a change set.
pub fn describe(changes: &StagedChangeSet) -> String {
    if changes.is_empty() {
        return HASH_ONLY_SUMMARY.to_string();
    }

    let mut out = format!("{}.\n", changes.diff_summary());
    out.push('\n');
    for (path, kind) in changes.files.iter().take(MAX_LISTED_FILES) {
        out.push_str(&format!("- {} `{}`\n", verb(*kind), path.display()));
    }
    let hidden = changes.len().saturating_sub(MAX_LISTED_FILES);
    if hidden > 0 {
        out.push_str(&format!("- and {hidden} more\n"));
    }
    out.trim_end().to_string()
}

fn verb(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Added => "add",
        ChangeKind::Modified => "modify",
        ChangeKind::Deleted => "delete",
    }
}

/// Cut `text` after `limit` whitespace-separated words, keeping the original
/// line structure of what remains.
pub fn truncate_words(text: &str, limit: usize) -> String {
    let mut words = 0;
    let mut in_word = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            in_word = false;
            continue;
        }
        if !in_word {
            in_word = true;
            words += 1;
            if words > limit {
                let kept = text[..idx].trim_end();
                return format!("{kept} {TRUNCATION_MARKER}");
            }
        }
    }
    text.to_string()
}

/// First non-empty line of `summary`, capped at `max_chars` characters.
pub fn subject_line(summary: &str, max_chars: usize) -> String {
    let first = summary
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(HASH_ONLY_SUMMARY);
    if first.chars().count() <= max_chars {
        return first.to_string();
    }
    let cut: String = first.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn changes(entries: &[(&str, ChangeKind)]) -> StagedChangeSet {
        let mut set = StagedChangeSet::default();
        for (path, kind) in entries {
            set.insert(*path, *kind);
        }
        set
    }

    #[test]
    fn describes_files_in_path_order() {
        let set = changes(&[
            ("src/b.rs", ChangeKind::Modified),
            ("docs/a.md", ChangeKind::Added),
        ]);
        let text = describe(&set);
        assert_eq!(
            text,
            "2 files changed (1 added, 1 modified).\n\n- add `docs/a.md`\n- modify `src/b.rs`"
        );
    }

    #[test]
    fn ledger_only_change_uses_hash_summary() {
        let ledger = PathBuf::from("pm/history.md");
        let set = changes(&[("pm/history.md", ChangeKind::Modified)]);
        let d = draft(&set, &ledger, None, &ChronicleConfig::default());
        assert_eq!(d.summary, HASH_ONLY_SUMMARY);
    }

    #[test]
    fn custom_message_wins() {
        let set = changes(&[("a", ChangeKind::Added)]);
        let d = draft(
            &set,
            Path::new("h.md"),
            Some("  Fix the parser\n\nDetails here.  "),
            &ChronicleConfig::default(),
        );
        assert_eq!(d.summary, "Fix the parser\n\nDetails here.");
        assert_eq!(d.subject, "Fix the parser");
        assert_eq!(
            d.commit_message(),
            "Fix the parser\n\nDetails here."
        );
    }

    #[test]
    fn truncation_bounds_word_count() {
        let text = "one two\nthree four five";
        assert_eq!(truncate_words(text, 3), "one two\nthree [...]");
        assert_eq!(truncate_words(text, 5), text);
        assert_eq!(truncate_words(text, 50), text);
    }

    #[test]
    fn subject_is_capped() {
        let long = "word ".repeat(30);
        let subject = subject_line(&long, 20);
        assert!(subject.chars().count() <= 20);
        assert!(subject.ends_with("..."));
    }

    #[test]
    fn many_files_collapse() {
        let mut set = StagedChangeSet::default();
        for i in 0..(MAX_LISTED_FILES + 3) {
            set.insert(format!("f{i:03}"), ChangeKind::Added);
        }
        let text = describe(&set);
        assert!(text.ends_with("- and 3 more"));
    }

    #[test]
    fn long_change_set_message_is_capped() {
        let mut set = StagedChangeSet::default();
        for i in 0..50 {
            set.insert(
                format!("services/billing/internal/reconciliation/report_{i:03}.rs"),
                ChangeKind::Modified,
            );
        }
        let d = draft(&set, Path::new("h.md"), None, &ChronicleConfig::default());
        assert!(d.summary.contains("report_039.rs"));

        let message = d.commit_message();
        assert!(message.chars().count() <= MAX_MESSAGE_CHARS, "{message}");
        assert!(message.starts_with(&format!("{}\n\n", d.subject)));
        assert!(message.ends_with("\n[...]"));
        assert!(message.contains("- modify `services/billing/internal/reconciliation/report_000.rs`"));
    }

    #[test]
    fn short_message_is_not_cut() {
        let d = Draft {
            summary: "Tidy\n\nOne line of detail.".to_string(),
            subject: "Tidy".to_string(),
        };
        assert_eq!(d.commit_message(), "Tidy\n\nOne line of detail.");
    }
}
