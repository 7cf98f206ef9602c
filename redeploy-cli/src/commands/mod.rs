//! CLI command implementations

pub mod pull;
pub mod purge;
pub mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redeploy_cloudflare::CloudflareClient;
use redeploy_core::reconciler::ReconcilerOptions;
use redeploy_core::{
    AssetCache, CacheInvalidator, Config, GitCliGateway, NoopInvalidator, ProcessLifecycle,
    Secrets, UpdateReconciler,
};

pub use pull::PullArgs;
pub use purge::PurgeArgs;
pub use run::RunArgs;

/// Cloudflare client when credentials are available, otherwise a no-op
pub(crate) fn build_invalidator(config: &Config) -> anyhow::Result<Arc<dyn CacheInvalidator>> {
    let secrets = Secrets::load()?;

    match CloudflareClient::from_config(&config.cloudflare, &secrets) {
        Ok(client) => {
            tracing::info!(zone = client.zone(), "Cache purging enabled");
            Ok(Arc::new(client))
        }
        Err(redeploy_cloudflare::Error::MissingCredentials(reason)) => {
            tracing::warn!(%reason, "Cache purging disabled");
            Ok(Arc::new(NoopInvalidator::new(reason)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Wire the reconciler for the working copy at `root`
pub(crate) fn build_reconciler(
    config: &Config,
    root: &Path,
    lifecycle: Arc<dyn ProcessLifecycle>,
) -> anyhow::Result<UpdateReconciler> {
    let gateway = Arc::new(GitCliGateway::new(root));
    let invalidator = build_invalidator(config)?;
    let assets = AssetCache::new(
        config.changes.content_prefix.clone(),
        config.minified_dir(root),
    );

    Ok(UpdateReconciler::new(
        gateway,
        invalidator,
        lifecycle,
        assets,
        ReconcilerOptions::from_config(config),
    ))
}

/// Print the effective configuration
pub fn print_config(config: &Config, config_file: Option<&Path>) {
    let token_set = Secrets::load()
        .ok()
        .and_then(|s| s.cache_token())
        .is_some();

    println!("Redeploy Configuration");
    println!("======================");
    println!();
    println!("Repository:");
    println!(
        "  url: {}",
        config
            .repository
            .url
            .as_deref()
            .map(|u| redeploy_core::git::RemoteUrl::parse(u)
                .map(|r| r.redacted())
                .unwrap_or_else(|_| format!("{} (invalid)", u)))
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!(
        "  path: {}",
        config
            .repository
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(discovered from .git)".to_string())
    );
    println!("  branch: {}", config.repository.branch);
    println!();
    println!("Polling:");
    println!(
        "  interval: {}",
        redeploy_core::config::format_interval(config.poll.interval)
    );
    println!();
    println!("Changes:");
    println!("  code_suffix: {}", config.changes.code_suffix);
    println!("  content_prefix: {}", config.changes.content_prefix);
    println!(
        "  minified_dir: {}",
        config
            .changes
            .minified_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<root>/minified".to_string())
    );
    println!();
    println!("Entry:");
    println!("  candidates: {}", config.entry.candidates.join(", "));
    println!("  launcher: {}", config.entry.launcher.join(" "));
    println!();
    println!("Cloudflare:");
    println!(
        "  zone: {}",
        config.cloudflare.zone.as_deref().unwrap_or("(not set)")
    );
    println!("  api_base: {}", config.cloudflare.api_base);
    println!("  token: {}", if token_set { "(set)" } else { "(not set)" });
    println!();

    let path: Option<PathBuf> = config_file
        .map(Path::to_path_buf)
        .or_else(Config::default_config_path);
    if let Some(path) = path {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}
