//! Repository gateway abstraction

use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// Result of a successful pull
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// Paths relative to the working-copy root, in diff order
    pub changed_files: Vec<String>,
    /// Head revision after the pull
    pub head_revision: String,
}

impl PullOutcome {
    /// Whether the pull brought in any changed files
    pub fn has_changes(&self) -> bool {
        !self.changed_files.is_empty()
    }
}

/// What `ensure_location` found or did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    /// The working copy already existed
    Present,
    /// The remote was cloned into the location
    Cloned,
}

/// Operations against the working copy and its remote
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// Working-copy root this gateway operates on
    fn location(&self) -> &Path;

    /// Clone `url` into the location unless it already exists
    async fn ensure_location(&self, url: &str) -> Result<LocationStatus>;

    /// Fetch and merge remote changes
    async fn pull(&self) -> Result<PullOutcome>;

    /// Hard-reset to the current head and force-clean untracked files
    async fn force_reset(&self) -> Result<()>;

    /// Identifier of the checked-out commit
    async fn current_head_revision(&self) -> Result<String>;
}
