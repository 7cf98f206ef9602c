//! Secrets management for redeploy
//!
//! The Cloudflare token is kept out of the main configuration file. It lives
//! in `~/.config/redeploy/secrets.toml`, which must have restrictive
//! permissions (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variable (CF_CACHE_TOKEN)
//! 2. Secrets file (~/.config/redeploy/secrets.toml)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Environment variable holding the Cloudflare API token
pub const CACHE_TOKEN_ENV: &str = "CF_CACHE_TOKEN";

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// Cloudflare secrets
    pub cloudflare: CloudflareSecrets,
}

/// Cloudflare-related secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CloudflareSecrets {
    /// API token with cache purge permission
    pub token: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_secrets_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path).map_err(Error::Io)?.permissions().mode();

            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }

            debug!(path = %path.display(), "Secrets file permissions OK");
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        if let Some(ref mut token) = secrets.cloudflare.token {
            *token = token.trim().to_string();
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("redeploy").join("secrets.toml"))
    }

    /// Get the Cloudflare token with environment variable override
    ///
    /// Priority: CF_CACHE_TOKEN env var > secrets file
    pub fn cache_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var(CACHE_TOKEN_ENV) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                debug!("Using Cloudflare token from {}", CACHE_TOKEN_ENV);
                return Some(token);
            }
        }

        self.cloudflare
            .token
            .as_ref()
            .filter(|t| !t.is_empty())
            .cloned()
    }
}
