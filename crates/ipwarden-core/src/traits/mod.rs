//! Core traits for ipwarden
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpResolver`]: Fetch the host's current public IPv4 address
//! - [`StateStore`]: Persist the single-row last-known-IP baseline
//! - [`RecordUpdater`] / [`AccessRuleUpdater`]: Propagate an IP change downstream

pub mod ip_resolver;
pub mod propagation;
pub mod state_store;

pub use ip_resolver::IpResolver;
pub use propagation::{AccessRuleUpdater, RecordUpdater, UpdateSummary};
pub use state_store::{CurrentIpRecord, StateStore};
