//! Configuration management for redeploy
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GIT_REPO_URL, CF_ZONE, REDEPLOY_*)
//! 3. Config file (~/.config/redeploy/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths::{find_path, PathMode};
use crate::{Error, Result};

/// Marker searched for when the working-copy root is not configured
pub const REPOSITORY_MARKER: &str = ".git";

/// Repository-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Remote to clone and pull from
    pub url: Option<String>,

    /// Working-copy root; discovered from the current directory when unset
    pub path: Option<PathBuf>,

    /// Branch whose ref lock is cleaned up at startup
    pub branch: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            branch: "main".to_string(),
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollConfig {
    /// Time between pulls
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
        }
    }
}

/// How changed files are classified
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChangesConfig {
    /// A changed file ending in this suffix triggers a restart
    pub code_suffix: String,

    /// Changed files under this prefix map onto the minified asset cache
    pub content_prefix: String,

    /// Minified asset directory; `<root>/minified` when unset
    pub minified_dir: Option<PathBuf>,
}

impl Default for ChangesConfig {
    fn default() -> Self {
        Self {
            code_suffix: ".ts".to_string(),
            content_prefix: "src/content/".to_string(),
            minified_dir: None,
        }
    }
}

/// Application entry point hand-off
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Entry files, first match wins
    pub candidates: Vec<String>,

    /// Command the entry file is passed to; empty to only resolve it
    pub launcher: Vec<String>,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            candidates: vec!["src/index.ts".to_string(), "src/main.ts".to_string()],
            launcher: vec!["npx".to_string(), "tsx".to_string()],
        }
    }
}

/// Cloudflare cache configuration (the token lives in secrets)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloudflareConfig {
    /// Zone whose cache is purged
    pub zone: Option<String>,

    /// API base URL
    pub api_base: String,
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            zone: None,
            api_base: "https://api.cloudflare.com/client/v4".to_string(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Repository configuration
    pub repository: RepositoryConfig,

    /// Poll loop configuration
    pub poll: PollConfig,

    /// Change classification
    pub changes: ChangesConfig,

    /// Entry point hand-off
    pub entry: EntryConfig,

    /// Cloudflare cache
    pub cloudflare: CloudflareConfig,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Remote repository URL
    pub repo_url: Option<String>,
    /// Working-copy root
    pub repo_path: Option<PathBuf>,
    /// Poll interval
    pub interval: Option<Duration>,
    /// Cloudflare zone
    pub zone: Option<String>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/redeploy/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("redeploy").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GIT_REPO_URL: Remote repository URL
    /// - CF_ZONE: Cloudflare zone identifier
    /// - REDEPLOY_REPO_PATH: Working-copy root
    /// - REDEPLOY_POLL_INTERVAL: Poll interval (e.g. `5m`, `30s`)
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("GIT_REPO_URL") {
            self.repository.url = Some(url);
        }

        if let Ok(zone) = std::env::var("CF_ZONE") {
            self.cloudflare.zone = Some(zone);
        }

        if let Ok(path) = std::env::var("REDEPLOY_REPO_PATH") {
            self.repository.path = Some(PathBuf::from(path));
        }

        if let Ok(interval) = std::env::var("REDEPLOY_POLL_INTERVAL") {
            self.poll.interval = parse_interval(&interval)?;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(url) = overrides.repo_url {
            self.repository.url = Some(url);
        }

        if let Some(path) = overrides.repo_path {
            self.repository.path = Some(path);
        }

        if let Some(interval) = overrides.interval {
            self.poll.interval = interval;
        }

        if let Some(zone) = overrides.zone {
            self.cloudflare.zone = Some(zone);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(overrides: CliOverrides) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(overrides))
    }

    /// Check that values needed for a run are present and well-formed
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval.is_zero() {
            return Err(Error::Config("Poll interval must be greater than zero".to_string()));
        }

        if self.changes.code_suffix.is_empty() {
            return Err(Error::Config("changes.code_suffix must not be empty".to_string()));
        }

        if let Some(url) = &self.repository.url {
            crate::git::RemoteUrl::parse(url)?;
        }

        Ok(())
    }

    /// The remote URL, required for cloning
    pub fn repo_url(&self) -> Result<&str> {
        self.repository.url.as_deref().ok_or_else(|| {
            Error::Config(
                "Repository URL not set. Set GIT_REPO_URL or repository.url in the config file"
                    .to_string(),
            )
        })
    }

    /// Resolve the working-copy root
    ///
    /// Uses `repository.path` when set, otherwise searches the ancestors of
    /// the current directory for `.git`.
    pub fn repository_root(&self) -> Result<PathBuf> {
        match &self.repository.path {
            Some(path) => Ok(path.clone()),
            None => find_path(&[REPOSITORY_MARKER], PathMode::Container),
        }
    }

    /// Minified asset directory for the given working-copy root
    pub fn minified_dir(&self, root: &Path) -> PathBuf {
        self.changes
            .minified_dir
            .clone()
            .unwrap_or_else(|| root.join("minified"))
    }
}

/// Parse a human-readable interval such as `5m` or `90s`
pub fn parse_interval(input: &str) -> Result<Duration> {
    humantime_serde::re::humantime::parse_duration(input.trim())
        .map_err(|e| Error::Config(format!("Invalid interval '{}': {}", input, e)))
}

/// Format an interval the way it is written in the config file
pub fn format_interval(interval: Duration) -> String {
    humantime_serde::re::humantime::format_duration(interval).to_string()
}
