//! Purge command - purge the CDN cache once

use clap::Args;
use redeploy_core::{Config, PurgeStatus};

use super::build_invalidator;

/// Purge every cached object for the configured zone
#[derive(Args, Debug)]
pub struct PurgeArgs {}

impl PurgeArgs {
    /// Execute the purge command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let invalidator = build_invalidator(config)?;

        match invalidator.purge_all().await {
            PurgeStatus::Purged => {
                println!("Cache purged.");
                Ok(())
            }
            PurgeStatus::Skipped(reason) => anyhow::bail!("Cache purge skipped: {}", reason),
            PurgeStatus::Failed(reason) => anyhow::bail!("Cache purge failed: {}", reason),
        }
    }
}
