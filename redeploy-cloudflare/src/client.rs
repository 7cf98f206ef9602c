//! Cloudflare API client using reqwest

use std::time::Duration;

use async_trait::async_trait;
use redeploy_core::config::CloudflareConfig;
use redeploy_core::{CacheInvalidator, PurgeStatus, Secrets};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use crate::{Error, Result};

/// Upper bound on a purge request so a slow API never stalls a tick
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare client bound to one zone
pub struct CloudflareClient {
    http: reqwest::Client,
    api_base: String,
    zone: String,
    token: String,
}

impl CloudflareClient {
    /// Create a client for `zone` authenticated with `token`
    pub fn new(zone: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("redeploy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: CloudflareConfig::default().api_base,
            zone: zone.into(),
            token: token.into(),
        })
    }

    /// Create a client from configuration and secrets
    ///
    /// Zone comes from `cloudflare.zone` (or CF_ZONE); the token from
    /// CF_CACHE_TOKEN or `~/.config/redeploy/secrets.toml`.
    pub fn from_config(config: &CloudflareConfig, secrets: &Secrets) -> Result<Self> {
        let zone = config
            .zone
            .clone()
            .filter(|z| !z.trim().is_empty())
            .ok_or_else(|| {
                Error::MissingCredentials(
                    "Zone not set. Set CF_ZONE or cloudflare.zone in the config file".to_string(),
                )
            })?;

        let token = secrets.cache_token().ok_or_else(|| {
            Error::MissingCredentials(
                "Token not found. Set CF_CACHE_TOKEN or add it to ~/.config/redeploy/secrets.toml"
                    .to_string(),
            )
        })?;

        Self::new(zone, token)?.with_api_base(&config.api_base)
    }

    /// Use a different API base URL
    pub fn with_api_base(mut self, api_base: &str) -> Result<Self> {
        Url::parse(api_base)
            .map_err(|e| Error::Parse(format!("Invalid API base {}: {}", api_base, e)))?;
        self.api_base = api_base.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Use a preconfigured HTTP client
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Zone this client purges
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Endpoint for purging the zone cache
    pub fn purge_url(&self) -> String {
        format!("{}/zones/{}/purge_cache", self.api_base, self.zone)
    }

    /// Purge every cached object in the zone
    pub async fn purge_everything(&self) -> Result<()> {
        let url = self.purge_url();
        debug!(zone = %self.zone, "Purging Cloudflare cache");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "purge_everything": true }))
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        info!(status = status.as_u16(), response = %body, "Cloudflare purge response");

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("api_base", &self.api_base)
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CacheInvalidator for CloudflareClient {
    async fn purge_all(&self) -> PurgeStatus {
        match self.purge_everything().await {
            Ok(()) => PurgeStatus::Purged,
            Err(e) => {
                warn!(zone = %self.zone, error = %e, "Cloudflare cache purge failed");
                PurgeStatus::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn local_client(base: &str) -> CloudflareClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        CloudflareClient::new("zone123", "tok")
            .unwrap()
            .with_http_client(http)
            .with_api_base(base)
            .unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request
    fn serve_once(status_line: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/client/v4", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];

            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            stream.write_all(response.as_bytes()).unwrap();
            tx.send(String::from_utf8_lossy(&request).to_string()).unwrap();
        });

        (base, rx)
    }

    #[test]
    fn test_purge_url() {
        let client = CloudflareClient::new("zone123", "token")
            .unwrap()
            .with_api_base("https://api.example.com/client/v4/")
            .unwrap();
        assert_eq!(
            client.purge_url(),
            "https://api.example.com/client/v4/zones/zone123/purge_cache"
        );
    }

    #[test]
    fn test_default_api_base() {
        let client = CloudflareClient::new("zone123", "token").unwrap();
        assert_eq!(
            client.purge_url(),
            "https://api.cloudflare.com/client/v4/zones/zone123/purge_cache"
        );
    }

    #[test]
    fn test_missing_zone() {
        let result = CloudflareClient::from_config(&CloudflareConfig::default(), &Secrets::default());
        assert!(matches!(result, Err(Error::MissingCredentials(_))));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = CloudflareClient::new("zone123", "super-secret").unwrap();
        assert!(!format!("{:?}", client).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_purge_sends_bearer_and_body() {
        let (base, rx) = serve_once("200 OK", r#"{"success":true,"errors":[],"result":{"id":"zone123"}}"#);
        let client = local_client(&base);

        assert_eq!(client.purge_all().await, PurgeStatus::Purged);

        let request = rx.recv().unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /client/v4/zones/zone123/purge_cache HTTP/1.1"));
        assert!(lower.contains("authorization: bearer tok"));
        assert!(lower.contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"purge_everything":true}"#));
    }

    #[tokio::test]
    async fn test_api_error_is_reported_as_failed() {
        let (base, _rx) = serve_once("403 Forbidden", r#"{"success":false}"#);
        let client = local_client(&base);

        match client.purge_all().await {
            PurgeStatus::Failed(message) => assert!(message.contains("403")),
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_api_is_reported_as_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = local_client(&base);

        assert!(matches!(client.purge_all().await, PurgeStatus::Failed(_)));
    }
}
