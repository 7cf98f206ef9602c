//! Reconciler states and outcomes

use std::fmt;
use std::path::PathBuf;

use crate::cache::PurgeStatus;

/// Where the reconciler is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    /// Startup has not run yet
    Uninitialized,
    /// Cloning the remote into a missing location
    Cloning,
    /// The clone failed; nothing more happens this boot
    CloneFailed,
    /// Waiting for the next tick
    Idle,
    /// A pull is in progress
    Pulling,
    /// A restart was requested
    Restarting,
}

impl ReconcilerState {
    /// States from which no further pulls are made
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconcilerState::CloneFailed | ReconcilerState::Restarting)
    }
}

impl fmt::Display for ReconcilerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcilerState::Uninitialized => "uninitialized",
            ReconcilerState::Cloning => "cloning",
            ReconcilerState::CloneFailed => "clone-failed",
            ReconcilerState::Idle => "idle",
            ReconcilerState::Pulling => "pulling",
            ReconcilerState::Restarting => "restarting",
        };
        f.write_str(name)
    }
}

/// Result of one poll tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was running, or the reconciler is in a terminal state
    Skipped,
    /// The pull brought nothing new
    Unchanged,
    /// Non-code files changed; caches were invalidated
    Updated {
        /// Files changed by the pull
        changed_files: Vec<String>,
        /// Minified cache entries that were deleted
        invalidated: Vec<PathBuf>,
        /// Result of the CDN purge
        purge: PurgeStatus,
    },
    /// Code files changed; a restart was requested
    Restarting {
        /// Files changed by the pull
        changed_files: Vec<String>,
        /// Minified cache entries that were deleted
        invalidated: Vec<PathBuf>,
        /// Result of the CDN purge
        purge: PurgeStatus,
    },
    /// The pull failed and the working copy was reset
    Recovered {
        /// Why the pull failed
        error: String,
        /// Whether the reset itself succeeded
        reset: bool,
    },
}

/// Result of startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The working copy is ready; hand off to the entry point
    Ready(TickOutcome),
    /// A restart was requested
    Restarting,
}
