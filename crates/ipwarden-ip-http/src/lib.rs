// # HTTP IP Resolver
//
// This crate resolves the host's public IPv4 address by asking an HTTP
// echo service.
//
// ## Purpose
//
// The daemon usually sits behind NAT, so the only reliable way to learn
// the public address is to ask an external observer. Echo services
// return the caller's source address as a plain-text body.
//
// ## Architecture
//
// One GET per resolution, no caching: the poll engine decides when to
// resolve, and a stale cached answer would defeat change detection.

use async_trait::async_trait;
use ipwarden_core::traits::IpResolver;
use ipwarden_core::{Error, Result};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default echo service
///
/// Returns the caller's public IP as a plain-text body.
pub const DEFAULT_ECHO_URL: &str = "https://api.ipify.org";

/// HTTP timeout for echo requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public IP resolver
///
/// Stateless and single-shot: every call to [`IpResolver::resolve`]
/// issues a fresh GET to the configured echo service.
#[derive(Debug, Clone)]
pub struct HttpIpResolver {
    /// Echo service URL
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver against the given echo service URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpIpResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_URL)
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::resolver(format!("request to {} failed: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(Error::resolver(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::resolver(format!("failed to read echo response: {e}")))?;

        let ip_text = body.trim();
        let ip: Ipv4Addr = ip_text
            .parse()
            .map_err(|_| Error::resolver(format!("echo service returned a non-IPv4 body: {ip_text:?}")))?;

        tracing::debug!("resolved public IP {ip} via {}", self.url);
        Ok(ip)
    }
}
