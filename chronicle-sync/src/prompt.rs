//! Operator decisions.
//!
//! The engine never reads stdin. Every question goes through a [`Prompter`],
//! so tests can script answers and non-interactive runs can fall back to
//! [`AssumeDefaults`].

use std::fmt;
use std::path::PathBuf;

use chronicle_core::types::BranchName;

/// Preview length for file lists inside question text.
const PREVIEW_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Question {
    /// Local branch is behind its remote-tracking ref.
    ProceedWithDivergence { remote_ref: String, behind: usize },
    /// Untracked files would be swept into the commit.
    IncludeUntracked { files: Vec<PathBuf> },
    /// Push working and archive branches after a successful commit.
    PushBranches { remote: String, branches: Vec<BranchName> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    pub fn accepted(self) -> bool {
        self == Decision::Accept
    }
}

impl Question {
    /// Answer used when nobody can be asked.
    ///
    /// Divergence and untracked files proceed (the merge and the commit are
    /// both recoverable); pushing is the one step that leaves the machine,
    /// so it defaults to no.
    pub fn default_decision(&self) -> Decision {
        match self {
            Question::ProceedWithDivergence { .. } | Question::IncludeUntracked { .. } => {
                Decision::Accept
            }
            Question::PushBranches { .. } => Decision::Decline,
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Question::ProceedWithDivergence { remote_ref, behind } => write!(
                f,
                "{remote_ref} has {behind} commit(s) not in the local branch; \
                 commit anyway and merge them afterwards?"
            ),
            Question::IncludeUntracked { files } => {
                let shown: Vec<String> = files
                    .iter()
                    .take(PREVIEW_LIMIT)
                    .map(|p| p.display().to_string())
                    .collect();
                let more = files.len().saturating_sub(PREVIEW_LIMIT);
                write!(f, "include {} untracked file(s) ({}", files.len(), shown.join(", "))?;
                if more > 0 {
                    write!(f, ", +{more} more")?;
                }
                write!(f, ") in this commit?")
            }
            Question::PushBranches { remote, branches } => {
                let names: Vec<&str> = branches.iter().map(BranchName::as_str).collect();
                write!(f, "push {} to {remote}?", names.join(" and "))
            }
        }
    }
}

pub trait Prompter {
    fn confirm(&mut self, question: &Question) -> Decision;
}

/// Answers every question with its [`Question::default_decision`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeDefaults;

impl Prompter for AssumeDefaults {
    fn confirm(&mut self, question: &Question) -> Decision {
        question.default_decision()
    }
}

/// Accepts everything, including the push.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&mut self, _question: &Question) -> Decision {
        Decision::Accept
    }
}

impl<F> Prompter for F
where
    F: FnMut(&Question) -> Decision,
{
    fn confirm(&mut self, question: &Question) -> Decision {
        self(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_defaults_to_decline() {
        let q = Question::PushBranches {
            remote: "origin".into(),
            branches: vec![BranchName::from("main")],
        };
        assert_eq!(AssumeDefaults.confirm(&q), Decision::Decline);
        assert_eq!(AssumeYes.confirm(&q), Decision::Accept);
    }

    #[test]
    fn divergence_defaults_to_accept() {
        let q = Question::ProceedWithDivergence {
            remote_ref: "refs/remotes/origin/main".into(),
            behind: 2,
        };
        assert!(AssumeDefaults.confirm(&q).accepted());
    }

    #[test]
    fn closures_are_prompters() {
        let mut asked = Vec::new();
        let mut prompter = |q: &Question| {
            asked.push(q.clone());
            Decision::Decline
        };
        let q = Question::IncludeUntracked {
            files: vec![PathBuf::from("notes.txt")],
        };
        assert_eq!(prompter.confirm(&q), Decision::Decline);
        assert_eq!(asked.len(), 1);
    }

    #[test]
    fn untracked_question_previews_files() {
        let files = (0..7).map(|i| PathBuf::from(format!("f{i}"))).collect();
        let text = Question::IncludeUntracked { files }.to_string();
        assert!(text.starts_with("include 7 untracked file(s) (f0, f1"));
        assert!(text.contains("+2 more"));
    }
}
