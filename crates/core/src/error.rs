//! Error types for companiongen.
//!
//! Malformed declarations and conflicts are not errors: they are filtered or
//! reported through [`crate::types::FilePlan`]. What remains here is what can
//! stop a file or a whole run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompanionError {
    /// The target root does not look like a repository we should write into.
    #[error("{} is not a recognized repository: {}", root.display(), missing.join("; "))]
    Precondition { root: PathBuf, missing: Vec<String> },

    /// Strict mode refused to write because conflicts were planned.
    #[error("strict mode: {count} conflicting companion(s), nothing was written")]
    StrictConflicts { count: usize },

    /// Reading or writing a single file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The atomic rename of a written temp file failed.
    #[error("failed to persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },

    /// A target path escaped the configured root.
    #[error("{} is outside of {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

impl CompanionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T, E = CompanionError> = std::result::Result<T, E>;
