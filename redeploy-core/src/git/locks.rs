//! Stale lock cleanup
//!
//! A process killed in the middle of a git operation leaves lock files
//! behind that make every later operation fail until they are removed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::Result;

/// Lock files that may be left in `<root>/.git` by an interrupted operation
pub fn lock_artifacts(root: &Path, branch: &str) -> Vec<PathBuf> {
    let git_dir = root.join(".git");
    vec![
        git_dir.join("refs").join("heads").join(format!("{}.lock", branch)),
        git_dir.join("HEAD.lock"),
        git_dir.join("index.lock"),
    ]
}

/// Remove any stale lock files, returning the ones that were removed
pub fn remove_stale_locks(root: &Path, branch: &str) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for lock in lock_artifacts(root, branch) {
        if !lock.exists() {
            continue;
        }

        match fs::remove_file(&lock) {
            Ok(()) => {
                info!(path = %lock.display(), "Removed stale git lock");
                removed.push(lock);
            }
            Err(e) => {
                warn!(path = %lock.display(), error = %e, "Failed to remove stale git lock");
                return Err(e.into());
            }
        }
    }

    Ok(removed)
}
