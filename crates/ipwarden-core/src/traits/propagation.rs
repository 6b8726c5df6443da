// # Propagation Traits
//
// Defines the interfaces for the two downstream update operations that
// run when the public IP changes: rewriting DNS A-records and rewriting
// firewall allowlist rules.
//
// ## Implementations
//
// - Cloudflare: `ipwarden-provider-cloudflare` crate (both traits)
//
// ## Partial-failure semantics
//
// Updaters never abort on the first error. They scan everything in
// scope, count successes and failures independently per item, and
// return an [`UpdateSummary`]. A transient failure for one zone or rule
// is an incremented counter, not an `Err`; `Err` is reserved for
// failures that prevent the operation from running at all (transport
// errors before any item was examined).

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Structured result of a propagation pass
///
/// Replaces a bare success boolean: callers get counts without
/// re-deriving them from logs, and `is_clean()` is the aggregate the
/// poll engine keys its "updated" vs "failed" outcome on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Items whose value matched the old IP
    pub matched: usize,
    /// Items successfully rewritten to the new IP
    pub updated: usize,
    /// Errors encountered (per item, per zone fetch, or wholesale)
    pub errors: usize,
}

impl UpdateSummary {
    /// True when every examined item updated without error
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }

    /// Summary for an operation that failed before any item could be examined
    pub fn failure() -> Self {
        Self {
            matched: 0,
            updated: 0,
            errors: 1,
        }
    }
}

/// Trait for DNS record updaters
///
/// Scans every zone visible to the credential and rewrites A-records
/// whose content equals the old IP. One zone's fetch failure must not
/// prevent updates in subsequent zones.
#[async_trait]
pub trait RecordUpdater: Send + Sync {
    /// Rewrite all matching A-records from `old_ip` to `new_ip`
    async fn update_records(
        &self,
        old_ip: Ipv4Addr,
        new_ip: Ipv4Addr,
    ) -> Result<UpdateSummary, crate::Error>;
}

/// Trait for firewall allowlist-rule updaters
///
/// Scans account-scoped access rules and recreates those whose target
/// value equals the old IP, preserving mode and notes. An inapplicable
/// account (no way to know whether rules exist) is a clean no-op, not
/// a failure.
#[async_trait]
pub trait AccessRuleUpdater: Send + Sync {
    /// Recreate all matching allowlist rules with `new_ip`
    async fn update_access_rules(
        &self,
        old_ip: Ipv4Addr,
        new_ip: Ipv4Addr,
    ) -> Result<UpdateSummary, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_summary() {
        let summary = UpdateSummary {
            matched: 3,
            updated: 3,
            errors: 0,
        };
        assert!(summary.is_clean());
    }

    #[test]
    fn dirty_summary() {
        let summary = UpdateSummary {
            matched: 3,
            updated: 2,
            errors: 1,
        };
        assert!(!summary.is_clean());
        assert!(!UpdateSummary::failure().is_clean());
    }

    #[test]
    fn empty_scan_is_clean() {
        assert!(UpdateSummary::default().is_clean());
    }
}
