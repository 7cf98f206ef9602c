//! Pull command - a single reconciliation tick

use std::sync::Arc;

use clap::Args;
use redeploy_core::git::remove_stale_locks;
use redeploy_core::{Config, HostProcess, TickOutcome};

use super::build_reconciler;

/// Pull once, purge and restart as needed
#[derive(Args, Debug)]
pub struct PullArgs {}

impl PullArgs {
    /// Execute the pull command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        config.validate()?;

        let root = config.repository_root()?;
        if !root.exists() {
            anyhow::bail!(
                "No working copy at {}. Run `redeploy run` to clone it first.",
                root.display()
            );
        }

        remove_stale_locks(&root, &config.repository.branch)?;

        let reconciler = build_reconciler(config, &root, Arc::new(HostProcess::new()))?;

        match reconciler.tick().await {
            TickOutcome::Unchanged => println!("Already up to date."),
            TickOutcome::Updated {
                changed_files,
                invalidated,
                purge,
            } => {
                println!("Updated {} file(s):", changed_files.len());
                for file in &changed_files {
                    println!("  {}", file);
                }
                println!("Removed {} cached asset(s)", invalidated.len());
                println!("Cache purge: {:?}", purge);
            }
            TickOutcome::Recovered { error, reset } => {
                anyhow::bail!(
                    "Pull failed: {} (working copy {})",
                    error,
                    if reset { "reset" } else { "NOT reset" }
                );
            }
            // the host process exits before a restart outcome is returned
            TickOutcome::Restarting { .. } | TickOutcome::Skipped => {}
        }

        if let Some(head) = reconciler.head_revision() {
            println!("HEAD: {}", head);
        }

        Ok(())
    }
}
