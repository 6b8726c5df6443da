// # State Store Trait
//
// Defines the interface for the persisted IP baseline.
//
// ## Purpose
//
// The state store holds exactly one record: the last *observed* public
// IP. It is the comparison baseline for change detection, not a record
// of what was successfully propagated: the engine moves the baseline
// even when a downstream update fails.
//
// ## Implementations
//
// - Postgres: `ipwarden-store-postgres` crate
// - In-memory (tests, persistence-free deployments): [`crate::MemoryStateStore`]

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// The singleton baseline row
///
/// Invariant: at most one row exists at any time. It is created on the
/// first successful resolution, mutated in place on every detected
/// change, and never deleted in normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentIpRecord {
    /// Primary key of the row
    pub id: i32,
    /// Last observed public IPv4 address
    pub ip: Ipv4Addr,
}

/// Trait for state store implementations
///
/// All methods must be safe to call concurrently from multiple tasks,
/// though in practice the poll engine is the sole reader and writer.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the baseline record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: The stored baseline
    /// - `Ok(None)`: The store is empty (first run)
    /// - `Err(Error)`: Storage error
    async fn read_current(&self) -> Result<Option<CurrentIpRecord>, crate::Error>;

    /// Create the singleton row
    ///
    /// The caller must ensure no row already exists; this layer does
    /// not enforce a uniqueness constraint.
    async fn insert(&self, ip: Ipv4Addr) -> Result<CurrentIpRecord, crate::Error>;

    /// Mutate the existing row's address in place
    async fn update(&self, record: &CurrentIpRecord, new_ip: Ipv4Addr)
    -> Result<(), crate::Error>;

    /// Create the backing table if absent
    ///
    /// Idempotent; invoked once at process start.
    async fn ensure_schema(&self) -> Result<(), crate::Error>;
}
