// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Holds the baseline row without persistence. Useful for tests and for
// deployments where losing the baseline on restart is acceptable (the
// first cycle after a restart simply re-bootstraps it).
//
// ## Crash Behavior
//
// - The baseline is lost on restart/crash
// - The first cycle afterwards treats the resolved IP as a first run
//   (no propagation, new baseline row)

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{CurrentIpRecord, StateStore};

/// In-memory state store implementation
///
/// The singleton row lives behind an RwLock; clones share it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<Option<CurrentIpRecord>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_none()
    }

    /// Clear the stored record
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read_current(&self) -> Result<Option<CurrentIpRecord>, Error> {
        Ok(*self.inner.read().await)
    }

    async fn insert(&self, ip: Ipv4Addr) -> Result<CurrentIpRecord, Error> {
        let mut guard = self.inner.write().await;
        if guard.is_some() {
            return Err(Error::state_store("baseline row already exists"));
        }
        let record = CurrentIpRecord { id: 1, ip };
        *guard = Some(record);
        Ok(record)
    }

    async fn update(&self, record: &CurrentIpRecord, new_ip: Ipv4Addr) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        match guard.as_mut() {
            Some(stored) if stored.id == record.id => {
                stored.ip = new_ip;
                Ok(())
            }
            _ => Err(Error::state_store(format!(
                "no baseline row with id {}",
                record.id
            ))),
        }
    }

    async fn ensure_schema(&self) -> Result<(), Error> {
        // Nothing to create for the memory store.
        Ok(())
    }
}
