//! Change-history ledger: file grammar and store.
//!
//! # File grammar
//!
//! ```text
//! # <Title>
//!
//! ---
//!
//! ## <TIMESTAMP>
//!
//! <summary, newest entry, hash not yet attached>
//!
//! ---
//!
//! ## <TIMESTAMP> | Hash: <40-hex-hash>
//!
//! <summary>
//! ```
//!
//! Exactly one title line, then entries newest-first, each introduced by a
//! literal `---` separator line. Only blank lines may appear between the title
//! and the first separator.
//!
//! The store never reorders entries and never repairs a malformed file; it
//! exposes append / attach-hash / most-recent plus `discard_draft` for
//! dropping an entry whose commit never happened.
//!
//! Store edits are spliced into the existing text. Bytes outside the entry
//! being added, hashed or dropped are written back exactly as read, line
//! endings and stray whitespace included. A new entry follows the file's
//! line ending (CRLF if the file uses it anywhere).

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{ledger_io, LedgerError};
use crate::types::{CommitHash, LedgerEntry, Timestamp};

/// Literal entry separator line.
pub const SEPARATOR: &str = "---";

const HASH_MARKER: &str = " | Hash: ";

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Parsed ledger file. `entries[0]` is the newest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerDocument {
    pub title: String,
    pub entries: Vec<LedgerEntry>,
}

impl LedgerDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    /// Parse ledger text. `path` is only used for error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, LedgerError> {
        let malformed = |line: usize, message: String| LedgerError::Malformed {
            path: path.to_path_buf(),
            line,
            message,
        };

        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

        // Title.
        let title = loop {
            match lines.next() {
                None => return Err(malformed(1, "empty file; expected `# <Title>`".into())),
                Some((_, l)) if l.trim().is_empty() => continue,
                Some((n, l)) => match l.strip_prefix("# ") {
                    Some(t) if !t.trim().is_empty() => break t.trim().to_string(),
                    _ => {
                        return Err(malformed(
                            n,
                            format!("expected title line `# <Title>`, found `{l}`"),
                        ))
                    }
                },
            }
        };

        // Preamble: blank lines only, up to the first separator (or EOF).
        let mut blocks: Vec<Vec<(usize, &str)>> = Vec::new();
        let mut separator_seen = false;
        for (n, l) in lines {
            if l.trim_end() == SEPARATOR {
                blocks.push(Vec::new());
                separator_seen = true;
                continue;
            }
            if !separator_seen {
                if l.trim().is_empty() {
                    continue;
                }
                return Err(malformed(
                    n,
                    format!("expected `{SEPARATOR}` after the title, found `{l}`"),
                ));
            }
            if let Some(block) = blocks.last_mut() {
                block.push((n, l));
            }
        }

        let mut entries = Vec::with_capacity(blocks.len());
        for block in blocks {
            entries.push(parse_entry(&block, &malformed)?);
        }

        Ok(Self { title, entries })
    }

    /// Serialize back to the file grammar. `parse(render(d)) == d`.
    pub fn render(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for entry in &self.entries {
            out.push_str(&entry_text(entry, "\n"));
        }
        out
    }

    pub fn newest(&self) -> Option<&LedgerEntry> {
        self.entries.first()
    }

    /// Insert `entry` at the top.
    ///
    /// Fails with [`LedgerError::PendingHash`] if the current newest entry has
    /// no hash, and with [`LedgerError::OutOfOrder`] unless `entry` is strictly
    /// newer than it.
    pub fn push_newest(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        if let Some(newest) = self.newest() {
            if !newest.is_hashed() {
                return Err(LedgerError::PendingHash {
                    timestamp: newest.timestamp.to_string(),
                });
            }
            if !entry.timestamp.is_after(&newest.timestamp) {
                return Err(LedgerError::OutOfOrder {
                    timestamp: entry.timestamp.to_string(),
                    newest: newest.timestamp.to_string(),
                });
            }
        }
        self.entries.insert(0, entry);
        Ok(())
    }

    /// Attach `hash` to the unhashed entry whose timestamp matches exactly.
    /// No other entry is touched.
    pub fn attach_hash(
        &mut self,
        timestamp: &Timestamp,
        hash: CommitHash,
    ) -> Result<&LedgerEntry, LedgerError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.timestamp == *timestamp && !e.is_hashed())
            .ok_or_else(|| LedgerError::EntryNotFound {
                timestamp: timestamp.to_string(),
            })?;
        entry.commit_hash = Some(hash);
        Ok(entry)
    }

    /// Remove the newest entry if it is unhashed and carries `timestamp`.
    pub fn discard_draft(&mut self, timestamp: &Timestamp) -> Result<LedgerEntry, LedgerError> {
        match self.newest() {
            Some(e) if e.timestamp == *timestamp && !e.is_hashed() => Ok(self.entries.remove(0)),
            _ => Err(LedgerError::EntryNotFound {
                timestamp: timestamp.to_string(),
            }),
        }
    }

    pub fn unhashed(&self) -> impl Iterator<Item = (usize, &LedgerEntry)> {
        self.entries.iter().enumerate().filter(|(_, e)| !e.is_hashed())
    }
}

fn parse_entry(
    block: &[(usize, &str)],
    malformed: &dyn Fn(usize, String) -> LedgerError,
) -> Result<LedgerEntry, LedgerError> {
    let first = block.iter().position(|(_, l)| !l.trim().is_empty());
    let last = block.iter().rposition(|(_, l)| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        let line = block.first().map(|(n, _)| *n).unwrap_or(0);
        return Err(malformed(line, "empty entry between separators".into()));
    };

    let (header_line, header) = block[first];
    let Some(header_body) = header.strip_prefix("## ") else {
        return Err(malformed(
            header_line,
            format!("expected entry header `## <timestamp>`, found `{header}`"),
        ));
    };

    let (raw_ts, raw_hash) = match header_body.split_once(HASH_MARKER) {
        Some((ts, hash)) => (ts, Some(hash)),
        None => (header_body, None),
    };
    let timestamp =
        Timestamp::parse(raw_ts).map_err(|e| malformed(header_line, e.to_string()))?;
    let commit_hash = raw_hash
        .map(CommitHash::parse)
        .transpose()
        .map_err(|e| malformed(header_line, e.to_string()))?;

    let body = &block[first + 1..=last];
    let start = body.iter().position(|(_, l)| !l.trim().is_empty());
    let Some(start) = start else {
        return Err(malformed(header_line, "entry has no summary text".into()));
    };
    let summary = body[start..]
        .iter()
        .map(|(_, l)| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(LedgerEntry {
        timestamp,
        summary,
        commit_hash,
    })
}

/// One entry as it follows the previous line: blank line, separator, header,
/// summary.
fn entry_text(entry: &LedgerEntry, eol: &str) -> String {
    let summary = entry.summary.lines().collect::<Vec<_>>().join(eol);
    format!(
        "{eol}{SEPARATOR}{eol}{eol}{}{eol}{eol}{summary}{eol}",
        entry.header()
    )
}

fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Byte positions in ledger text that has already parsed cleanly.
struct Layout {
    /// Just past the title line.
    title_end: usize,
    entries: Vec<EntrySpan>,
}

struct EntrySpan {
    /// Blank lines leading up to the separator, the separator and everything
    /// after it up to the next such run (or the end of the file).
    block: Range<usize>,
    /// Header line without its line ending.
    header: Range<usize>,
}

impl Layout {
    fn scan(text: &str) -> Self {
        let mut offset = 0;
        let mut title_end = None;
        let mut blank_from: Option<usize> = None;
        let mut awaiting_header = false;
        let mut entries: Vec<EntrySpan> = Vec::new();

        for raw in text.split_inclusive('\n') {
            let start = offset;
            offset += raw.len();
            let line = raw.trim_end_matches(['\n', '\r']);
            let blank = line.trim().is_empty();

            if title_end.is_none() {
                if !blank {
                    title_end = Some(offset);
                }
                continue;
            }
            if line.trim_end() == SEPARATOR {
                let block_start = blank_from.take().unwrap_or(start);
                if let Some(previous) = entries.last_mut() {
                    previous.block.end = block_start;
                }
                entries.push(EntrySpan {
                    block: block_start..text.len(),
                    header: start..start,
                });
                awaiting_header = true;
                continue;
            }
            if blank {
                blank_from.get_or_insert(start);
                continue;
            }
            blank_from = None;
            if awaiting_header {
                if let Some(entry) = entries.last_mut() {
                    entry.header = start..start + line.len();
                }
                awaiting_header = false;
            }
        }

        Self {
            title_end: title_end.unwrap_or(text.len()),
            entries,
        }
    }
}

/// Normalize summary text so it survives a parse/render round trip: CRLF to
/// LF, outer blank lines trimmed, and bare `---` lines rewritten to `***` so
/// a summary can never forge an entry separator.
pub fn sanitize_summary(summary: &str) -> String {
    summary
        .replace("\r\n", "\n")
        .lines()
        .map(|l| {
            if l.trim_end() == SEPARATOR {
                "***"
            } else {
                l.trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Exclusive owner of the ledger file on disk.
///
/// Every mutation is a load → validate on the parsed document → splice into
/// the raw text → atomic save (`.tmp` sibling + rename).
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
    title: String,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>, LedgerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|e| ledger_io(&self.path, e))
    }

    /// `None` if the ledger does not exist yet.
    pub fn load(&self) -> Result<Option<LedgerDocument>, LedgerError> {
        match self.read()? {
            Some(text) => LedgerDocument::parse(&text, &self.path).map(Some),
            None => Ok(None),
        }
    }

    /// Raw text plus parsed document; a missing file has no entry to act on.
    fn load_existing(
        &self,
        timestamp: &Timestamp,
    ) -> Result<(String, LedgerDocument), LedgerError> {
        let text = self.read()?.ok_or_else(|| not_found(timestamp))?;
        let doc = LedgerDocument::parse(&text, &self.path)?;
        Ok((text, doc))
    }

    /// Newest entry, or `None` if the ledger does not exist or is empty.
    pub fn most_recent_entry(&self) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self.load()?.and_then(|doc| doc.entries.into_iter().next()))
    }

    /// Insert a new unhashed top-of-file entry, creating the file if needed.
    pub fn append_entry(
        &self,
        timestamp: Timestamp,
        summary: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let entry = LedgerEntry::new(timestamp, sanitize_summary(summary));
        let text = match self.read()? {
            None => {
                let mut doc = LedgerDocument::new(self.title.clone());
                doc.push_newest(entry.clone())?;
                doc.render()
            }
            Some(text) => {
                let mut doc = LedgerDocument::parse(&text, &self.path)?;
                doc.push_newest(entry.clone())?;

                let eol = line_ending(&text);
                let at = Layout::scan(&text).title_end;
                let mut out = String::with_capacity(text.len() + entry.summary.len() + 64);
                out.push_str(&text[..at]);
                if !out.ends_with('\n') {
                    out.push_str(eol);
                }
                out.push_str(&entry_text(&entry, eol));
                out.push_str(&text[at..]);
                out
            }
        };
        self.write_text(&text)?;
        Ok(entry)
    }

    /// Rewrite only the header line of the matching entry.
    pub fn attach_hash(
        &self,
        timestamp: &Timestamp,
        hash: CommitHash,
    ) -> Result<LedgerEntry, LedgerError> {
        let (mut text, mut doc) = self.load_existing(timestamp)?;
        let index = doc
            .entries
            .iter()
            .position(|e| e.timestamp == *timestamp && !e.is_hashed())
            .ok_or_else(|| not_found(timestamp))?;
        let entry = doc.attach_hash(timestamp, hash)?.clone();

        let layout = Layout::scan(&text);
        let span = layout.entries.get(index).ok_or_else(|| not_found(timestamp))?;
        text.replace_range(span.header.clone(), &entry.header());
        self.write_text(&text)?;
        Ok(entry)
    }

    /// Cut the newest entry's block out of the file.
    pub fn discard_draft(&self, timestamp: &Timestamp) -> Result<LedgerEntry, LedgerError> {
        let (mut text, mut doc) = self.load_existing(timestamp)?;
        let removed = doc.discard_draft(timestamp)?;

        let layout = Layout::scan(&text);
        let span = layout.entries.first().ok_or_else(|| not_found(timestamp))?;
        text.replace_range(span.block.clone(), "");
        self.write_text(&text)?;
        Ok(removed)
    }

    /// Create a title-only ledger if none exists. Returns `true` if created.
    pub fn init(&self) -> Result<bool, LedgerError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.write_text(&LedgerDocument::new(self.title.clone()).render())?;
        Ok(true)
    }

    fn write_text(&self, text: &str) -> Result<(), LedgerError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| ledger_io(dir, e))?;
            }
        }
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger".to_string());
        let tmp = self.path.with_file_name(format!("{file_name}.tmp"));
        std::fs::write(&tmp, text).map_err(|e| ledger_io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(ledger_io(&self.path, e));
        }
        Ok(())
    }
}

fn not_found(timestamp: &Timestamp) -> LedgerError {
    LedgerError::EntryNotFound {
        timestamp: timestamp.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
