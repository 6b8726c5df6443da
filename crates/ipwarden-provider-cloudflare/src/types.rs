//! Cloudflare API v4 wire types
//!
//! Only the fields the updaters actually read are modeled; the API
//! returns many more, which serde skips.

use serde::{Deserialize, Serialize};

/// Envelope shared by all Cloudflare list endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}

/// A zone as returned by `GET /zones`
#[derive(Debug, Clone, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,

    /// Owning account; absent on some partial API responses
    #[serde(default)]
    pub account: Option<Account>,
}

/// The account object embedded in a zone
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
}

/// A DNS record as returned by `GET /zones/:id/dns_records`
///
/// Serialize is derived too because the update payload echoes these
/// fields back; the API rejects a PUT that omits `name` or `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,

    #[serde(rename = "type")]
    pub record_type: String,

    pub name: String,
    pub content: String,

    #[serde(default)]
    pub proxied: bool,

    pub ttl: u32,
}

/// An IP access rule as returned by the firewall rules endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AccessRule {
    pub id: String,

    /// Action, e.g. "whitelist" or "block"
    pub mode: String,

    pub configuration: RuleConfiguration,

    #[serde(default)]
    pub notes: Option<String>,
}

/// The match criterion of an access rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfiguration {
    /// Criterion kind, e.g. "ip", "ip6", "ip_range", "country"
    pub target: String,

    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_record_round_trips_the_type_field() {
        let json = r#"{
            "id": "r1",
            "type": "A",
            "name": "home.example.com",
            "content": "1.2.3.4",
            "proxied": true,
            "ttl": 300
        }"#;

        let record: DnsRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.record_type, "A");
        assert_eq!(record.content, "1.2.3.4");
        assert!(record.proxied);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["type"], "A");
    }

    #[test]
    fn missing_proxied_defaults_to_false() {
        let json = r#"{
            "id": "r1",
            "type": "A",
            "name": "home.example.com",
            "content": "1.2.3.4",
            "ttl": 1
        }"#;

        let record: DnsRecord = serde_json::from_str(json).unwrap();
        assert!(!record.proxied);
    }

    #[test]
    fn zone_without_account_parses() {
        let json = r#"{"id": "z1", "name": "example.com"}"#;
        let zone: Zone = serde_json::from_str(json).unwrap();
        assert!(zone.account.is_none());
    }

    #[test]
    fn empty_list_envelope_defaults_to_no_results() {
        let response: ListResponse<Zone> = serde_json::from_str("{}").unwrap();
        assert!(response.result.is_empty());
    }
}
