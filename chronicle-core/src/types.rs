//! Domain types for the change-history ledger and branch synchronization.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, SubsecRound};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// `YYYY-MM-DD HH:MM:SS ±HHMM`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Length of the abbreviated commit id shown in reports.
pub const SHORT_HASH_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed git branch name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchName(pub String);

impl BranchName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A full 40-character lowercase hex commit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitHash(String);

impl CommitHash {
    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        let value = value.trim();
        let valid = value.len() == 40
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(LedgerError::InvalidHash {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 8-character abbreviation used in user-facing reports.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_HASH_LEN]
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for CommitHash {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommitHash> for String {
    fn from(hash: CommitHash) -> Self {
        hash.0
    }
}

/// Local time with an explicit UTC offset, second precision.
///
/// Equality is textual: two timestamps naming the same instant with different
/// offsets are *not* equal, because ledger entries are matched by their header
/// text.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Local::now().fixed_offset())
    }

    pub fn from_datetime(datetime: DateTime<FixedOffset>) -> Self {
        Self(datetime.trunc_subsecs(0))
    }

    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        DateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
            .map(Self::from_datetime)
            .map_err(|_| LedgerError::InvalidTimestamp {
                value: value.to_string(),
            })
    }

    pub fn datetime(&self) -> DateTime<FixedOffset> {
        self.0
    }

    /// Strictly later instant than `other`, regardless of offsets.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    pub fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0 + chrono::Duration::seconds(seconds))
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.0.offset() == other.0.offset()
    }
}

impl Eq for Timestamp {}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.format(TIMESTAMP_FORMAT).fmt(f)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Ledger entry
// ---------------------------------------------------------------------------

/// One change-history entry.
///
/// `commit_hash` is absent until the run *after* the entry's commit attaches
/// it (one-commit-lag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: Timestamp,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<CommitHash>,
}

impl LedgerEntry {
    pub fn new(timestamp: Timestamp, summary: impl Into<String>) -> Self {
        Self {
            timestamp,
            summary: summary.into(),
            commit_hash: None,
        }
    }

    pub fn with_hash(mut self, hash: CommitHash) -> Self {
        self.commit_hash = Some(hash);
        self
    }

    pub fn is_hashed(&self) -> bool {
        self.commit_hash.is_some()
    }

    /// `## <timestamp>` or `## <timestamp> | Hash: <hash>`
    pub fn header(&self) -> String {
        match &self.commit_hash {
            Some(hash) => format!("{} | Hash: {hash}", header_prefix(&self.timestamp)),
            None => header_prefix(&self.timestamp),
        }
    }
}

/// The portion of an entry header that never changes after creation.
pub fn header_prefix(timestamp: &Timestamp) -> String {
    format!("## {timestamp}")
}

// ---------------------------------------------------------------------------
// Staged changes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Maps a `git diff --name-status` letter. Renames and copies are not
    /// expected (callers pass `--no-renames`); type changes count as modified.
    pub fn from_status_letter(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(Self::Added),
            'M' | 'T' => Some(Self::Modified),
            'D' => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// The index contents relative to `HEAD`, built fresh on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChangeSet {
    pub files: BTreeMap<PathBuf, ChangeKind>,
}

impl StagedChangeSet {
    pub fn insert(&mut self, path: impl Into<PathBuf>, kind: ChangeKind) {
        self.files.insert(path.into(), kind);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.files.values().filter(|k| **k == kind).count()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// A copy with `path` removed.
    pub fn without(&self, path: &Path) -> Self {
        let mut files = self.files.clone();
        files.remove(path);
        Self { files }
    }

    /// One-line description, e.g. `3 files changed (1 added, 2 modified)`.
    pub fn diff_summary(&self) -> String {
        let noun = if self.len() == 1 { "file" } else { "files" };
        let parts: Vec<String> = [ChangeKind::Added, ChangeKind::Modified, ChangeKind::Deleted]
            .into_iter()
            .filter_map(|kind| match self.count(kind) {
                0 => None,
                n => Some(format!("{n} {kind}")),
            })
            .collect();
        if parts.is_empty() {
            return "no files changed".to_string();
        }
        format!("{} {noun} changed ({})", self.len(), parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Sync outcomes
// ---------------------------------------------------------------------------

/// Which of the two managed branches an outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchRole {
    Working,
    Archive,
}

impl fmt::Display for BranchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchRole::Working => write!(f, "working"),
            BranchRole::Archive => write!(f, "archive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Synchronized,
    SkippedNotFound,
    /// The caller chose not to run this step.
    SkippedDeclined,
    Failed { message: String },
}

impl SyncStatus {
    /// Reporting label: one of `synchronized`, `skipped`, `failed`.
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Synchronized => "synchronized",
            SyncStatus::SkippedNotFound | SyncStatus::SkippedDeclined => "skipped",
            SyncStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncStatus::Failed { .. })
    }
}

/// Result of an archive synchronization or a push, for reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub role: BranchRole,
    pub branch: BranchName,
    #[serde(flatten)]
    pub status: SyncStatus,
    /// Commit created on the target branch by this step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_commit: Option<CommitHash>,
}

impl SyncOutcome {
    pub fn new(role: BranchRole, branch: BranchName, status: SyncStatus) -> Self {
        Self {
            role,
            branch,
            status,
            new_commit: None,
        }
    }

    pub fn failed(role: BranchRole, branch: BranchName, message: impl Into<String>) -> Self {
        Self::new(
            role,
            branch,
            SyncStatus::Failed {
                message: message.into(),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn timestamp_parse_and_display() {
        let ts = Timestamp::parse("2025-03-14 09:26:53 -0700").unwrap();
        assert_eq!(ts.to_string(), "2025-03-14 09:26:53 -0700");
    }

    #[test]
    fn timestamp_equality_respects_offset() {
        let a = Timestamp::parse("2025-03-14 16:26:53 +0000").unwrap();
        let b = Timestamp::parse("2025-03-14 09:26:53 -0700").unwrap();
        assert_ne!(a, b);
        assert!(!a.is_after(&b) && !b.is_after(&a));
    }

    #[test]
    fn timestamp_now_has_second_precision() {
        let ts = Timestamp::now();
        assert_eq!(ts, Timestamp::parse(&ts.to_string()).unwrap());
    }

    #[test]
    fn timestamp_rejects_missing_offset() {
        assert!(matches!(
            Timestamp::parse("2025-03-14 09:26:53"),
            Err(LedgerError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn commit_hash_validation() {
        let hash = CommitHash::parse(HASH).unwrap();
        assert_eq!(hash.short(), "01234567");
        assert!(CommitHash::parse(&HASH.to_uppercase()).is_err());
        assert!(CommitHash::parse("abc123").is_err());
    }

    #[test]
    fn entry_header_with_and_without_hash() {
        let ts = Timestamp::parse("2025-01-02 03:04:05 +0100").unwrap();
        let entry = LedgerEntry::new(ts, "summary");
        assert_eq!(entry.header(), "## 2025-01-02 03:04:05 +0100");
        let hashed = entry.with_hash(CommitHash::parse(HASH).unwrap());
        assert_eq!(
            hashed.header(),
            format!("## 2025-01-02 03:04:05 +0100 | Hash: {HASH}")
        );
    }

    #[test]
    fn diff_summary_counts_kinds() {
        let mut set = StagedChangeSet::default();
        set.insert("a.md", ChangeKind::Added);
        set.insert("b.md", ChangeKind::Modified);
        set.insert("c.md", ChangeKind::Modified);
        assert_eq!(set.diff_summary(), "3 files changed (1 added, 2 modified)");
        assert_eq!(
            set.without(Path::new("a.md")).diff_summary(),
            "2 files changed (2 modified)"
        );
    }

    #[test]
    fn sync_status_labels() {
        assert_eq!(SyncStatus::Synchronized.label(), "synchronized");
        assert_eq!(SyncStatus::SkippedNotFound.label(), "skipped");
        assert_eq!(SyncStatus::SkippedDeclined.label(), "skipped");
        assert_eq!(
            SyncStatus::Failed {
                message: "x".into()
            }
            .label(),
            "failed"
        );
    }
}
