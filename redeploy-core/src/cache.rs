//! CDN cache invalidation seam
//!
//! A stale CDN cache is tolerable, a failed reconciliation is not, so
//! `purge_all` reports a status instead of an error.

use async_trait::async_trait;
use tracing::warn;

/// Outcome of a purge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeStatus {
    /// The provider accepted the purge
    Purged,
    /// No purge was attempted
    Skipped(String),
    /// The purge was attempted and failed; already logged
    Failed(String),
}

impl PurgeStatus {
    /// Whether the provider accepted the purge
    pub fn is_purged(&self) -> bool {
        matches!(self, PurgeStatus::Purged)
    }
}

/// Something that can drop every cached object for the site
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Purge all cached content. Never fails; failures are logged.
    async fn purge_all(&self) -> PurgeStatus;
}

/// Invalidator used when no CDN credentials are configured
#[derive(Debug, Clone, Default)]
pub struct NoopInvalidator {
    reason: String,
}

impl NoopInvalidator {
    /// Create a no-op invalidator that logs `reason` on each purge
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn purge_all(&self) -> PurgeStatus {
        warn!(reason = %self.reason, "Skipping cache purge");
        PurgeStatus::Skipped(self.reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_skips() {
        let invalidator = NoopInvalidator::new("CF_ZONE not set");
        let status = invalidator.purge_all().await;
        assert_eq!(status, PurgeStatus::Skipped("CF_ZONE not set".to_string()));
        assert!(!status.is_purged());
    }
}
