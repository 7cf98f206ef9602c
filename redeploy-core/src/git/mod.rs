//! Git operations for redeploy
//!
//! This module provides the repository gateway used by the reconciler, the
//! stale lock cleanup run at startup and remote URL validation.

mod cli;
mod gateway;
mod locks;
mod remote;

pub use cli::GitCliGateway;
pub use gateway::{LocationStatus, PullOutcome, RepositoryGateway};
pub use locks::{lock_artifacts, remove_stale_locks};
pub use remote::RemoteUrl;
