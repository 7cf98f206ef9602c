//! Redeploy Cloudflare - CDN cache purging for redeploy
//!
//! Implements the core `CacheInvalidator` seam with a single
//! `purge_everything` call against the Cloudflare zone API.

mod client;
mod error;

pub use client::CloudflareClient;
pub use error::{Error, Result};
