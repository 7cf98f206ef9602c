//! Error types for redeploy

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for redeploy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for redeploy operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// libgit2 error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// None of the candidate markers exist within the ancestor depth bound
    #[error("Could not find any of {candidates:?} within {depth} levels above {}", .start.display())]
    PathNotFound {
        /// Marker names that were searched for, in order
        candidates: Vec<String>,
        /// Directory the search started from
        start: PathBuf,
        /// Number of ancestor levels searched
        depth: usize,
    },

    /// Cloning the remote repository failed
    #[error("Clone failed: {0}")]
    Clone(String),

    /// Pulling remote changes failed
    #[error("Pull failed: {0}")]
    Pull(String),

    /// A pull merged but the changed files could not be determined
    #[error("Change detection failed after merge: {0}")]
    ChangeDetection(String),

    /// A git subprocess could not be run or exited unsuccessfully
    #[error("Command failed: {0}")]
    Command(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
