//! Error types for chronicle-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying I/O failure, annotated with the ledger path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The existing ledger does not follow the title/separator/entry grammar.
    /// Never repaired automatically.
    #[error("malformed ledger at {path}, line {line}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// No unhashed entry carries this exact timestamp.
    #[error("no unhashed ledger entry with timestamp {timestamp}")]
    EntryNotFound { timestamp: String },

    /// The newest entry still lacks its hash; it must be attached before a
    /// new entry can go on top.
    #[error("newest ledger entry ({timestamp}) has no commit hash yet")]
    PendingHash { timestamp: String },

    /// A new entry must be strictly newer than the current newest entry.
    #[error("entry timestamp {timestamp} is not newer than the newest entry ({newest})")]
    OutOfOrder { timestamp: String, newest: String },

    #[error("invalid timestamp '{value}': expected YYYY-MM-DD HH:MM:SS +HHMM")]
    InvalidTimestamp { value: String },

    #[error("invalid commit hash '{value}': expected 40 lowercase hex characters")]
    InvalidHash { value: String },
}

/// Errors from loading or saving `.chronicle.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the file path and serde_yaml line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An explicitly requested config file does not exist.
    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Convenience constructor for [`LedgerError::Io`].
pub(crate) fn ledger_io(path: impl Into<PathBuf>, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
