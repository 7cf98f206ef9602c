//! Update reconciliation
//!
//! The reconciler owns the working copy for the life of the process. At
//! startup it clones a missing working copy or pulls an existing one; after
//! that it pulls on a fixed interval. Each pull is classified:
//!
//! - no changed files: nothing happens
//! - changed files: the CDN cache is purged and matching minified entries are
//!   deleted
//! - any changed file with the code suffix: additionally the process restarts
//! - the pull failed: the working copy is hard-reset and cleaned, the process
//!   keeps running the code it started with
//! - the pull merged but the changed files could not be read: the caches are
//!   cleared and the process restarts, with no reset
//!
//! Ticks are single-flight. A tick that starts while another is still running
//! is skipped, so a reset always finishes before the next pull begins.

mod state;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub use state::{ReconcilerState, StartupOutcome, TickOutcome};

use crate::assets::AssetCache;
use crate::cache::CacheInvalidator;
use crate::config::Config;
use crate::git::{remove_stale_locks, LocationStatus, PullOutcome, RepositoryGateway};
use crate::lifecycle::{ProcessLifecycle, RestartReason};
use crate::{Error, Result};

/// Sentinel written to the working-copy root after a successful clone
pub const CLONED_MARKER: &str = "cloned.info";

/// Settings the reconciler needs from the configuration
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Remote to clone from when the working copy is missing
    pub remote_url: Option<String>,
    /// Branch whose ref lock is cleaned up at startup
    pub branch: String,
    /// Changed files with this suffix trigger a restart
    pub code_suffix: String,
}

impl ReconcilerOptions {
    /// Take the reconciler settings from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote_url: config.repository.url.clone(),
            branch: config.repository.branch.clone(),
            code_suffix: config.changes.code_suffix.clone(),
        }
    }
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives the working copy and decides when to purge and restart
pub struct UpdateReconciler {
    gateway: Arc<dyn RepositoryGateway>,
    invalidator: Arc<dyn CacheInvalidator>,
    lifecycle: Arc<dyn ProcessLifecycle>,
    assets: AssetCache,
    options: ReconcilerOptions,
    state: watch::Sender<ReconcilerState>,
    head_revision: watch::Sender<Option<String>>,
    in_flight: Mutex<()>,
}

impl std::fmt::Debug for UpdateReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateReconciler")
            .field("location", &self.gateway.location())
            .field("state", &*self.state.borrow())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl UpdateReconciler {
    /// Create a reconciler over the given collaborators
    pub fn new(
        gateway: Arc<dyn RepositoryGateway>,
        invalidator: Arc<dyn CacheInvalidator>,
        lifecycle: Arc<dyn ProcessLifecycle>,
        assets: AssetCache,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            gateway,
            invalidator,
            lifecycle,
            assets,
            options,
            state: watch::Sender::new(ReconcilerState::Uninitialized),
            head_revision: watch::Sender::new(None),
            in_flight: Mutex::new(()),
        }
    }

    /// Working-copy root
    pub fn location(&self) -> &Path {
        self.gateway.location()
    }

    /// Current state
    pub fn state(&self) -> ReconcilerState {
        *self.state.borrow()
    }

    /// Head revision after the last successful pull or clone
    pub fn head_revision(&self) -> Option<String> {
        self.head_revision.borrow().clone()
    }

    fn transition(&self, next: ReconcilerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Reconciler state changed");
        }
    }

    /// Clean up stale locks, then clone or pull
    ///
    /// A failed clone is returned as an error and leaves the reconciler in
    /// [`ReconcilerState::CloneFailed`].
    pub async fn startup(&self) -> Result<StartupOutcome> {
        let root = self.gateway.location().to_path_buf();
        remove_stale_locks(&root, &self.options.branch)?;

        if root.exists() {
            info!(
                path = %root.display(),
                version = env!("CARGO_PKG_VERSION"),
                "Repository already exists, pulling updates"
            );
            return Ok(self.startup_pull().await);
        }

        info!(path = %root.display(), "Repository not found, cloning");
        self.transition(ReconcilerState::Cloning);

        let cloned = match self.options.remote_url.as_deref() {
            Some(url) => self.gateway.ensure_location(url).await,
            None => Err(Error::Config("Repository URL not set".to_string())),
        };

        match cloned {
            Ok(LocationStatus::Cloned) => {}
            Ok(LocationStatus::Present) => {
                self.transition(ReconcilerState::Uninitialized);
                return Ok(self.startup_pull().await);
            }
            Err(e) => {
                error!(error = %e, "Failed to clone");
                self.transition(ReconcilerState::CloneFailed);
                return Err(e);
            }
        }

        info!(path = %root.display(), "Repository cloned");
        write_cloned_marker(&root);

        match self.gateway.current_head_revision().await {
            Ok(head) => {
                self.head_revision.send_replace(Some(head));
            }
            Err(e) => debug!(error = %e, "Could not read head revision after clone"),
        }

        self.invalidator.purge_all().await;

        self.transition(ReconcilerState::Restarting);
        self.lifecycle.restart(&RestartReason::Cloned);
        Ok(StartupOutcome::Restarting)
    }

    async fn startup_pull(&self) -> StartupOutcome {
        match self.tick().await {
            TickOutcome::Restarting { .. } => StartupOutcome::Restarting,
            other => StartupOutcome::Ready(other),
        }
    }

    /// Pull once and act on the result
    ///
    /// Failures are contained: whatever happens, the caller gets an outcome.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Previous pull still running, skipping tick");
            return TickOutcome::Skipped;
        };

        if self.state().is_terminal() {
            debug!(state = %self.state(), "Reconciler finished, skipping tick");
            return TickOutcome::Skipped;
        }

        self.transition(ReconcilerState::Pulling);

        match self.gateway.pull().await {
            Ok(pull) => self.apply(pull).await,
            Err(Error::ChangeDetection(reason)) => self.restart_unclassified(reason).await,
            Err(e) => self.recover(e).await,
        }
    }

    async fn apply(&self, pull: PullOutcome) -> TickOutcome {
        self.head_revision.send_replace(Some(pull.head_revision.clone()));

        if !pull.has_changes() {
            debug!(head = %pull.head_revision, "No remote changes");
            self.transition(ReconcilerState::Idle);
            return TickOutcome::Unchanged;
        }

        info!(
            head = %pull.head_revision,
            files = ?pull.changed_files,
            "Updated from remote"
        );

        let code_files: Vec<String> = pull
            .changed_files
            .iter()
            .filter(|f| f.ends_with(self.options.code_suffix.as_str()))
            .cloned()
            .collect();

        let purge = self.invalidator.purge_all().await;
        let invalidated = self.assets.invalidate(&pull.changed_files);

        if code_files.is_empty() {
            self.transition(ReconcilerState::Idle);
            return TickOutcome::Updated {
                changed_files: pull.changed_files,
                invalidated,
                purge,
            };
        }

        self.transition(ReconcilerState::Restarting);
        self.lifecycle
            .restart(&RestartReason::CodeChanged { files: code_files });

        TickOutcome::Restarting {
            changed_files: pull.changed_files,
            invalidated,
            purge,
        }
    }

    /// The pull merged but what changed is unknown; assume code changed
    async fn restart_unclassified(&self, reason: String) -> TickOutcome {
        error!(%reason, "Could not classify merged changes");

        let purge = self.invalidator.purge_all().await;
        debug!(
            path = %self.assets.minified_dir().display(),
            "Clearing minified asset cache"
        );
        let invalidated = self.assets.invalidate_all();

        self.transition(ReconcilerState::Restarting);
        self.lifecycle
            .restart(&RestartReason::UnclassifiedUpdate { reason });

        TickOutcome::Restarting {
            changed_files: Vec::new(),
            invalidated,
            purge,
        }
    }

    async fn recover(&self, cause: Error) -> TickOutcome {
        error!(error = %cause, "Failed to pull updates");

        let reset = match self.gateway.force_reset().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to reset working copy");
                false
            }
        };

        // Observability only: after a reset the working copy sits at this
        // head even though no pull succeeded.
        if reset {
            match self.gateway.current_head_revision().await {
                Ok(head) => {
                    self.head_revision.send_replace(Some(head));
                }
                Err(e) => debug!(error = %e, "Could not read head revision after reset"),
            }
        }

        self.transition(ReconcilerState::Idle);
        TickOutcome::Recovered {
            error: cause.to_string(),
            reset,
        }
    }

    /// Tick every `interval` until a restart is requested
    ///
    /// The first tick fires one interval from now; startup already pulled.
    pub async fn run(&self, interval: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;

            if self.state().is_terminal() {
                return;
            }
        }
    }
}

fn write_cloned_marker(root: &Path) {
    let marker = root.join(CLONED_MARKER);
    let contents = format!(
        "Repo has been cloned at {}.\n",
        chrono::Utc::now().to_rfc3339()
    );

    if let Err(e) = std::fs::write(&marker, contents) {
        warn!(path = %marker.display(), error = %e, "Failed to write clone marker");
    }
}
