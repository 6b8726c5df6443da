//! State store implementations
//!
//! The in-memory store lives here; the Postgres store has its own crate
//! (`ipwarden-store-postgres`) to keep the database driver out of core.

pub mod memory;

pub use memory::MemoryStateStore;
