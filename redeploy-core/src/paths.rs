//! Ancestor-scanning path discovery
//!
//! Used once at startup to locate the working-copy root (marker `.git`) and
//! again to locate the application entry point.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result};

/// Number of directory levels searched, starting with the directory itself
pub const MAX_ANCESTOR_DEPTH: usize = 10;

/// What a successful search returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// The directory that contains the marker
    Container,
    /// The marker path itself
    Exact,
}

/// Search the ancestors of the current directory for the first candidate
pub fn find_path<S: AsRef<str>>(candidates: &[S], mode: PathMode) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    find_path_from(&cwd, candidates, mode)
}

/// Search `start` and its ancestors for the first candidate
///
/// Each candidate is tried at every depth, nearest first, before the next
/// candidate is considered.
pub fn find_path_from<S: AsRef<str>>(
    start: &Path,
    candidates: &[S],
    mode: PathMode,
) -> Result<PathBuf> {
    for candidate in candidates {
        let candidate = candidate.as_ref();

        for dir in start.ancestors().take(MAX_ANCESTOR_DEPTH) {
            let path = dir.join(candidate);
            if path.exists() {
                debug!(candidate, path = %path.display(), "Found marker");
                return Ok(match mode {
                    PathMode::Container => dir.to_path_buf(),
                    PathMode::Exact => path,
                });
            }
        }
    }

    Err(Error::PathNotFound {
        candidates: candidates.iter().map(|c| c.as_ref().to_string()).collect(),
        start: start.to_path_buf(),
        depth: MAX_ANCESTOR_DEPTH,
    })
}
