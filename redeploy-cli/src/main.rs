//! Redeploy CLI - Self-updating deployment watcher
//!
//! Keeps a working copy current, purges the CDN cache on updates and exits
//! for the supervisor to restart it when code changes arrive.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use redeploy_core::config::{parse_interval, CliOverrides};
use redeploy_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{PullArgs, PurgeArgs, RunArgs};

/// Redeploy: keep a deployment in sync with its repository
#[derive(Parser, Debug)]
#[command(name = "redeploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/redeploy/config.toml)
    #[arg(long, global = true, env = "REDEPLOY_CONFIG")]
    config: Option<PathBuf>,

    /// Remote repository URL
    #[arg(long, global = true, env = "GIT_REPO_URL")]
    repo_url: Option<String>,

    /// Working-copy root (discovered from the current directory when unset)
    #[arg(long, global = true, env = "REDEPLOY_REPO_PATH")]
    repo_path: Option<PathBuf>,

    /// Poll interval, e.g. 5m or 30s
    #[arg(long, global = true, value_parser = parse_interval_arg)]
    interval: Option<std::time::Duration>,

    /// Cloudflare zone identifier
    #[arg(long, global = true, env = "CF_ZONE")]
    zone: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone or pull, hand off to the app and keep polling (default)
    Run(RunArgs),

    /// Pull once and act on the changes
    Pull(PullArgs),

    /// Purge the CDN cache once
    Purge(PurgeArgs),

    /// Show current configuration
    Config,

    /// Show version information
    Version,
}

fn parse_interval_arg(input: &str) -> Result<std::time::Duration, String> {
    parse_interval(input).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Variables from .env never override the real environment
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let overrides = CliOverrides {
        repo_url: cli.repo_url.clone(),
        repo_path: cli.repo_path.clone(),
        interval: cli.interval,
        zone: cli.zone.clone(),
    };

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?
            .with_env_overrides()?
            .with_cli_overrides(overrides),
        None => Config::load_with_overrides(overrides)?,
    };

    if cli.verbose {
        tracing::debug!(
            repo_path = ?config.repository.path,
            interval = ?config.poll.interval,
            zone = ?config.cloudflare.zone,
            "Configuration loaded"
        );
    }

    match cli.command {
        None => RunArgs::default().execute(&config).await?,
        Some(Commands::Run(args)) => args.execute(&config).await?,
        Some(Commands::Pull(args)) => args.execute(&config).await?,
        Some(Commands::Purge(args)) => args.execute(&config).await?,
        Some(Commands::Config) => commands::print_config(&config, cli.config.as_deref()),
        Some(Commands::Version) => {
            println!("redeploy {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
