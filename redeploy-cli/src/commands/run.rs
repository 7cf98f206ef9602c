//! Run command - the full watcher lifecycle

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use redeploy_core::lifecycle::locate_entry;
use redeploy_core::{Config, HostProcess, StartupOutcome};
use tracing::{info, warn};

use super::build_reconciler;

/// Clone or pull, hand off to the app, then poll for updates
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Do not launch the application entry point
    #[arg(long)]
    no_entry: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        config.validate()?;

        let root = config.repository_root()?;
        let host = Arc::new(HostProcess::new());
        let reconciler = build_reconciler(config, &root, host.clone())?;

        match reconciler.startup().await? {
            StartupOutcome::Restarting => return Ok(()),
            StartupOutcome::Ready(outcome) => {
                info!(
                    path = %root.display(),
                    head = ?reconciler.head_revision(),
                    outcome = ?outcome,
                    "Working copy ready"
                );
            }
        }

        if !self.no_entry {
            hand_off(config, &root, &host)?;
        }

        info!(interval = ?config.poll.interval, "Watching for updates");

        tokio::select! {
            _ = reconciler.run(config.poll.interval) => {}
            status = host.entry_exited() => {
                warn!(status = %status, "Entry point exited");
                std::process::exit(status.code().unwrap_or(1));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
            }
        }

        Ok(())
    }
}

fn hand_off(config: &Config, root: &Path, host: &HostProcess) -> anyhow::Result<()> {
    let entry = locate_entry(root, &config.entry.candidates)?;

    if config.entry.launcher.is_empty() {
        info!(entry = %entry.display(), "Entry point resolved, no launcher configured");
        return Ok(());
    }

    host.launch_entry(&config.entry.launcher, &entry, root)?;
    Ok(())
}
