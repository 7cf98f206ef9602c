//! Error types for Cloudflare operations

use thiserror::Error;

/// Result type for Cloudflare operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the Cloudflare API
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Cloudflare API error ({status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Zone or token not configured
    #[error("Missing Cloudflare credentials: {0}")]
    MissingCredentials(String),

    /// Invalid API base URL
    #[error("Parse error: {0}")]
    Parse(String),
}
