//! Remote repository URL validation

use std::fmt;
use std::path::Path;

use url::Url;

use crate::{Error, Result};

/// A validated clone URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    /// URL passed to `git clone`
    pub clone_url: String,
    /// Host, when the remote is not a local path
    pub host: Option<String>,
}

impl RemoteUrl {
    /// Parse a clone URL
    ///
    /// Supports:
    /// - `https://host/owner/repo(.git)` and other `scheme://` URLs git understands
    /// - `git@host:owner/repo.git`
    /// - absolute local paths
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.contains("://") {
            let url = Url::parse(input)
                .map_err(|e| Error::Config(format!("Invalid repository URL {}: {}", input, e)))?;

            return match url.scheme() {
                "https" | "http" | "ssh" | "git" | "file" => Ok(Self {
                    clone_url: input.to_string(),
                    host: url.host_str().map(|h| h.to_string()),
                }),
                scheme => Err(Error::Config(format!(
                    "Unsupported repository URL scheme '{}' in {}",
                    scheme, input
                ))),
            };
        }

        // scp-like syntax (e.g., git@github.com:owner/repo.git)
        if let Some((user_host, path)) = input.split_once(':') {
            if let Some((_, host)) = user_host.split_once('@') {
                if !host.is_empty() && !path.is_empty() {
                    return Ok(Self {
                        clone_url: input.to_string(),
                        host: Some(host.to_string()),
                    });
                }
            }
        }

        if Path::new(input).is_absolute() {
            return Ok(Self {
                clone_url: input.to_string(),
                host: None,
            });
        }

        Err(Error::Config(format!(
            "Invalid repository URL: {}. Expected https://host/owner/repo, git@host:owner/repo.git or an absolute path",
            input
        )))
    }

    /// The URL with any embedded credentials removed, for logging
    pub fn redacted(&self) -> String {
        match Url::parse(&self.clone_url) {
            Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
                let _ = url.set_username("");
                let _ = url.set_password(None);
                url.to_string()
            }
            _ => self.clone_url.clone(),
        }
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}
