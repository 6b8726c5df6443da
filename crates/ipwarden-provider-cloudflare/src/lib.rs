// # Cloudflare Propagation Provider
//
// This crate implements both propagation targets against the Cloudflare
// API v4: DNS A-records and account-level IP access (firewall
// allowlist) rules.
//
// ## Behavior
//
// - **DNS**: every zone visible to the token is scanned; every A-record
//   whose content equals the old IP is rewritten to the new IP with its
//   name, proxied flag and TTL preserved. A zone that fails to list its
//   records is counted as an error and the scan moves on; one broken
//   zone never blocks the rest.
// - **Firewall**: the account is discovered from the first zone. Rules
//   are immutable on the value field, so each allowlist rule matching
//   the old IP is deleted and recreated with the new IP, keeping its
//   mode and notes. A failed delete skips the recreate so the old rule
//   is never duplicated.
//
// ## Architectural Constraints
//
// - One-shot and stateless: all retry and scheduling is owned by the
//   poll engine
// - No background tasks
// - The API token never appears in logs or Debug output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones`
// - List DNS Records: GET `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - List Access Rules: GET `/accounts/:account_id/firewall/access_rules/rules`
// - Delete Access Rule: DELETE `/accounts/:account_id/firewall/access_rules/rules/:rule_id`
// - Create Access Rule: POST `/accounts/:account_id/firewall/access_rules/rules`

pub mod types;

use async_trait::async_trait;
use ipwarden_core::traits::{AccessRuleUpdater, RecordUpdater, UpdateSummary};
use ipwarden_core::{Error, Result};
use std::net::Ipv4Addr;
use std::time::Duration;

use types::{AccessRule, DnsRecord, ListResponse, Zone};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare API client implementing both propagation traits
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
#[derive(Clone)]
pub struct CloudflareClient {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a client against the production Cloudflare API
    ///
    /// # Panics
    ///
    /// Panics if the token is empty; a client without credentials can
    /// never make a successful call.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self::with_base_url(api_token, CLOUDFLARE_API_BASE)
    }

    /// Create a client against a custom base URL (for tests)
    pub fn with_base_url(api_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let api_token = api_token.into();
        if api_token.is_empty() {
            panic!("Cloudflare API token cannot be empty");
        }

        Self {
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// List all zones visible to the token
    ///
    /// A non-success status is logged and treated as "no zones": the
    /// caller decides whether an empty zone list is an error.
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        let url = format!("{}/zones", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("zone list request failed: {e}")))?;

        if !response.status().is_success() {
            tracing::error!("zone list returned HTTP {}", response.status());
            return Ok(Vec::new());
        }

        let body: ListResponse<Zone> = response
            .json()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("failed to parse zone list: {e}")))?;

        Ok(body.result)
    }

    /// Discover the account ID from the first visible zone
    pub async fn account_id(&self) -> Result<Option<String>> {
        let zones = self.list_zones().await?;
        Ok(zones
            .first()
            .and_then(|zone| zone.account.as_ref())
            .map(|account| account.id.clone()))
    }

    /// List all DNS records in a zone
    ///
    /// Unlike zone listing, a failure here is an error: the caller
    /// counts it against the zone and continues with the next one.
    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        let url = format!("{}/zones/{zone_id}/dns_records", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                Error::provider("cloudflare", format!("record list request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "cloudflare",
                format!("record list for zone {zone_id} returned HTTP {}", response.status()),
            ));
        }

        let body: ListResponse<DnsRecord> = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("failed to parse record list: {e}"))
        })?;

        Ok(body.result)
    }

    /// Rewrite a record's content, preserving its other fields
    ///
    /// Cloudflare's PUT replaces the whole record, so name, proxied and
    /// ttl are echoed back unchanged alongside the new content.
    async fn put_dns_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
        new_content: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/zones/{zone_id}/dns_records/{}",
            self.base_url, record.id
        );

        let payload = serde_json::json!({
            "content": new_content,
            "name": record.name,
            "proxied": record.proxied,
            "ttl": record.ttl,
            "type": record.record_type,
        });

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                Error::provider("cloudflare", format!("record update request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "cloudflare",
                format!(
                    "record update for {} returned HTTP {}",
                    record.name,
                    response.status()
                ),
            ));
        }

        Ok(())
    }

    /// List an account's IP access rules
    ///
    /// A non-success status is logged and treated as "no rules".
    async fn list_access_rules(&self, account_id: &str) -> Result<Vec<AccessRule>> {
        let url = format!(
            "{}/accounts/{account_id}/firewall/access_rules/rules",
            self.base_url
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                Error::provider("cloudflare", format!("access rule list request failed: {e}"))
            })?;

        if !response.status().is_success() {
            tracing::error!("access rule list returned HTTP {}", response.status());
            return Ok(Vec::new());
        }

        let body: ListResponse<AccessRule> = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("failed to parse access rule list: {e}"))
        })?;

        Ok(body.result)
    }

    async fn delete_access_rule(&self, account_id: &str, rule_id: &str) -> Result<()> {
        let url = format!(
            "{}/accounts/{account_id}/firewall/access_rules/rules/{rule_id}",
            self.base_url
        );
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                Error::provider("cloudflare", format!("access rule delete failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "cloudflare",
                format!(
                    "access rule delete for {rule_id} returned HTTP {}",
                    response.status()
                ),
            ));
        }

        Ok(())
    }

    /// Create an allowlist rule for the given IP
    ///
    /// Mode and notes come from the rule being replaced.
    async fn create_access_rule(
        &self,
        account_id: &str,
        mode: &str,
        ip: Ipv4Addr,
        notes: Option<&str>,
    ) -> Result<()> {
        let url = format!(
            "{}/accounts/{account_id}/firewall/access_rules/rules",
            self.base_url
        );

        let mut payload = serde_json::json!({
            "mode": mode,
            "configuration": {
                "target": "ip",
                "value": ip.to_string(),
            },
        });
        if let Some(notes) = notes {
            payload["notes"] = serde_json::Value::String(notes.to_string());
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                Error::provider("cloudflare", format!("access rule create failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "cloudflare",
                format!("access rule create returned HTTP {}", response.status()),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl RecordUpdater for CloudflareClient {
    /// Rewrite every A-record pointing at the old IP, across all zones
    ///
    /// Zero visible zones is reported as an error: a token that can see
    /// no zones cannot have propagated anything, and silently reporting
    /// success would mask a misconfigured credential.
    async fn update_records(&self, old_ip: Ipv4Addr, new_ip: Ipv4Addr) -> Result<UpdateSummary> {
        let zones = self.list_zones().await?;
        if zones.is_empty() {
            tracing::warn!("no zones visible to the API token, cannot update DNS records");
            return Ok(UpdateSummary::failure());
        }

        let old = old_ip.to_string();
        let new = new_ip.to_string();
        let mut summary = UpdateSummary::default();

        for zone in &zones {
            let records = match self.list_dns_records(&zone.id).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!("skipping zone {}: {e}", zone.name);
                    summary.errors += 1;
                    continue;
                }
            };

            for record in records
                .iter()
                .filter(|r| r.record_type == "A" && r.content == old)
            {
                summary.matched += 1;
                match self.put_dns_record(&zone.id, record, &new).await {
                    Ok(()) => {
                        tracing::info!(
                            "updated A-record {} in zone {} from {old} to {new}",
                            record.name,
                            zone.name
                        );
                        summary.updated += 1;
                    }
                    Err(e) => {
                        tracing::error!("failed to update A-record {}: {e}", record.name);
                        summary.errors += 1;
                    }
                }
            }
        }

        tracing::debug!(
            "DNS scan over {} zones: {} matched, {} updated, {} errors",
            zones.len(),
            summary.matched,
            summary.updated,
            summary.errors
        );
        Ok(summary)
    }
}

#[async_trait]
impl AccessRuleUpdater for CloudflareClient {
    /// Replace every allowlist rule pinned to the old IP
    ///
    /// Delete-then-create, because Cloudflare access rules cannot change
    /// their match value in place. A failed delete skips the create for
    /// that rule so the allowlist never gains a duplicate.
    async fn update_access_rules(
        &self,
        old_ip: Ipv4Addr,
        new_ip: Ipv4Addr,
    ) -> Result<UpdateSummary> {
        let Some(account_id) = self.account_id().await? else {
            tracing::info!("no account discoverable from zones, skipping firewall update");
            return Ok(UpdateSummary::default());
        };

        let old = old_ip.to_string();
        let rules = self.list_access_rules(&account_id).await?;
        let mut summary = UpdateSummary::default();

        for rule in rules
            .iter()
            .filter(|r| r.configuration.target == "ip" && r.configuration.value == old)
        {
            summary.matched += 1;

            if let Err(e) = self.delete_access_rule(&account_id, &rule.id).await {
                tracing::error!("failed to delete access rule {}: {e}", rule.id);
                summary.errors += 1;
                continue;
            }

            match self
                .create_access_rule(&account_id, &rule.mode, new_ip, rule.notes.as_deref())
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        "replaced {} access rule for {old} with {new_ip}",
                        rule.mode
                    );
                    summary.updated += 1;
                }
                Err(e) => {
                    // The old rule is already gone; surface the loss
                    // loudly so the operator can recreate it.
                    tracing::error!(
                        "deleted access rule {} for {old} but failed to recreate it for {new_ip}: {e}",
                        rule.id
                    );
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_token_not_exposed_in_debug() {
        let client = CloudflareClient::new("secret_token_12345");
        let debug_str = format!("{client:?}");
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("CloudflareClient"));
    }

    #[test]
    #[should_panic(expected = "API token cannot be empty")]
    fn empty_token_panics() {
        CloudflareClient::new("");
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let client = CloudflareClient::with_base_url("token", "http://localhost:9999/");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
