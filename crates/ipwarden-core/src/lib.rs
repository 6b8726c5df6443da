// # ipwarden-core
//
// Core library for the public-IP change detection and propagation daemon.
//
// ## Architecture Overview
//
// - **IpResolver**: Trait for fetching the host's current public IPv4 address
// - **StateStore**: Trait for the persisted single-row IP baseline
// - **RecordUpdater** / **AccessRuleUpdater**: Traits for the two downstream
//   propagation targets (DNS A-records, firewall allowlist rules)
// - **PollEngine**: The polling loop that ties detection, propagation and
//   persistence together
//
// ## Design Principles
//
// 1. **Separation of Concerns**: the engine owns all sequencing and error
//    containment; implementations are single-shot and stateless
// 2. **Partial-failure tolerance**: propagation reports structured counts
//    instead of aborting on the first error
// 3. **Library-First**: the engine is embeddable; the daemon is a thin shell

pub mod config;
pub mod engine;
pub mod error;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::PollConfig;
pub use engine::{EngineEvent, PollEngine};
pub use error::{Error, Result};
pub use state::MemoryStateStore;
pub use traits::{
    AccessRuleUpdater, CurrentIpRecord, IpResolver, RecordUpdater, StateStore, UpdateSummary,
};
