//! Redeploy Core - Core library for the redeploy deployment watcher
//!
//! Keeps a working copy of a remote repository current, purges the CDN cache
//! when updates arrive and restarts the hosting process when code changes.

pub mod assets;
pub mod cache;
pub mod config;
pub mod error;
pub mod git;
pub mod lifecycle;
pub mod paths;
pub mod reconciler;
pub mod secrets;

pub use assets::AssetCache;
pub use cache::{CacheInvalidator, NoopInvalidator, PurgeStatus};
pub use config::Config;
pub use error::{Error, Result};
pub use git::{GitCliGateway, PullOutcome, RepositoryGateway};
pub use lifecycle::{HostProcess, ProcessLifecycle, RestartReason};
pub use paths::{find_path, find_path_from, PathMode, MAX_ANCESTOR_DEPTH};
pub use reconciler::{ReconcilerState, StartupOutcome, TickOutcome, UpdateReconciler};
pub use secrets::Secrets;
