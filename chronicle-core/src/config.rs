//! Tool configuration.
//!
//! # Resolution order
//!
//! 1. an explicit file (`--config <path>`)
//! 2. `<repo>/.chronicle.yaml`
//! 3. `<config dir>/chronicle/config.yaml`
//! 4. built-in defaults
//!
//! The first file found wins; fields it omits take their defaults.
//!
//! # API pattern
//!
//! As elsewhere in the crate, functions that touch a per-user location come in
//! two forms: `fn_at(config_home, …)` with an explicit directory (used by
//! tests) and `fn(…)` which derives it from `dirs::config_dir()`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};
use crate::types::BranchName;

/// File name of the per-repository config.
pub const CONFIG_FILE_NAME: &str = ".chronicle.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronicleConfig {
    pub working_branch: BranchName,
    pub archive_branch: BranchName,
    pub remote: String,
    /// Relative to the repository root unless absolute.
    pub ledger_path: PathBuf,
    pub ledger_title: String,
    /// Relative to the repository root unless absolute.
    pub archive_index_path: PathBuf,
    pub summary_word_limit: usize,
    pub subject_max_chars: usize,
}

impl Default for ChronicleConfig {
    fn default() -> Self {
        Self {
            working_branch: BranchName::from("main"),
            archive_branch: BranchName::from("archive"),
            remote: "origin".to_string(),
            ledger_path: PathBuf::from("project_management/change_history.md"),
            ledger_title: "Change History".to_string(),
            archive_index_path: PathBuf::from("project_management/archive_index.md"),
            summary_word_limit: 1000,
            subject_max_chars: 72,
        }
    }
}

impl ChronicleConfig {
    pub fn ledger_path_in(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.ledger_path)
    }

    pub fn archive_index_path_in(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.archive_index_path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.working_branch.0.trim().is_empty() || self.archive_branch.0.trim().is_empty() {
            return Err(ConfigError::Invalid("branch names must not be empty".into()));
        }
        if self.working_branch == self.archive_branch {
            return Err(ConfigError::Invalid(format!(
                "working and archive branch are both '{}'",
                self.working_branch
            )));
        }
        if self.remote.trim().is_empty() {
            return Err(ConfigError::Invalid("remote must not be empty".into()));
        }
        if self.ledger_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("ledger_path must not be empty".into()));
        }
        if self.summary_word_limit == 0 {
            return Err(ConfigError::Invalid(
                "summary_word_limit must be positive".into(),
            ));
        }
        if !(16..=200).contains(&self.subject_max_chars) {
            return Err(ConfigError::Invalid(
                "subject_max_chars must be between 16 and 200".into(),
            ));
        }
        Ok(())
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Repository(PathBuf),
    User(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(p) | ConfigSource::Repository(p) | ConfigSource::User(p) => {
                write!(f, "{}", p.display())
            }
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<repo>/.chronicle.yaml` (pure, no I/O).
pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_FILE_NAME)
}

/// `<config_home>/chronicle/config.yaml` (pure, no I/O).
pub fn user_config_path_at(config_home: &Path) -> PathBuf {
    config_home.join("chronicle").join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate a single config file.
pub fn load_file(path: &Path) -> Result<ChronicleConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io(path, e))?;
    // An empty file means "all defaults"; serde_yaml rejects it otherwise.
    let config: ChronicleConfig = if contents.trim().is_empty() {
        ChronicleConfig::default()
    } else {
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?
    };
    config.validate()?;
    Ok(config)
}

/// Resolve the active config for `repo_root`.
///
/// `explicit` short-circuits the search and must exist. `config_home` is the
/// per-user config directory; `None` skips the user-level lookup.
pub fn resolve_at(
    repo_root: &Path,
    explicit: Option<&Path>,
    config_home: Option<&Path>,
) -> Result<(ChronicleConfig, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_file(path)?, ConfigSource::Explicit(path.to_path_buf())));
    }

    let repo_path = repo_config_path(repo_root);
    if repo_path.exists() {
        return Ok((load_file(&repo_path)?, ConfigSource::Repository(repo_path)));
    }

    if let Some(home) = config_home {
        let user_path = user_config_path_at(home);
        if user_path.exists() {
            return Ok((load_file(&user_path)?, ConfigSource::User(user_path)));
        }
    }

    Ok((ChronicleConfig::default(), ConfigSource::Defaults))
}

/// `resolve_at` convenience wrapper using `dirs::config_dir()`.
pub fn resolve(
    repo_root: &Path,
    explicit: Option<&Path>,
) -> Result<(ChronicleConfig, ConfigSource), ConfigError> {
    let config_home = dirs::config_dir();
    resolve_at(repo_root, explicit, config_home.as_deref())
}

// ---------------------------------------------------------------------------
// Save / init
// ---------------------------------------------------------------------------

/// Atomically write `config` to `<repo>/.chronicle.yaml`.
///
/// Write flow: serialize → `.tmp` sibling → `rename`.
pub fn save_at(repo_root: &Path, config: &ChronicleConfig) -> Result<PathBuf, ConfigError> {
    config.validate()?;
    let path = repo_config_path(repo_root);
    let tmp = path.with_file_name(format!("{CONFIG_FILE_NAME}.tmp"));
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| config_io(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| config_io(&path, e))?;
    Ok(path)
}

/// Write a default `.chronicle.yaml` if none exists.
///
/// Idempotent: returns `(config, false)` with the existing file's contents
/// when already present.
pub fn init_at(repo_root: &Path) -> Result<(ChronicleConfig, bool), ConfigError> {
    let path = repo_config_path(repo_root);
    if path.exists() {
        return Ok((load_file(&path)?, false));
    }
    let config = ChronicleConfig::default();
    save_at(repo_root, &config)?;
    Ok((config, true))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
