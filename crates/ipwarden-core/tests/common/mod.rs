//! Test doubles and common utilities for poll-cycle contract tests
//!
//! These doubles record calls and return scripted results so the
//! contract tests can pin the engine's sequencing without any real I/O.

use async_trait::async_trait;
use ipwarden_core::config::PollConfig;
use ipwarden_core::error::{Error, Result};
use ipwarden_core::traits::{
    AccessRuleUpdater, CurrentIpRecord, IpResolver, RecordUpdater, StateStore, UpdateSummary,
};
use ipwarden_core::MemoryStateStore;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Parse an IPv4 literal (test convenience)
pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("valid IPv4 literal")
}

/// A poll config with a short interval and no jitter, for driving the
/// loop deterministically in tests
pub fn test_config() -> PollConfig {
    PollConfig {
        interval_secs: 1,
        jitter_secs: 0,
        event_channel_capacity: 64,
    }
}

/// Shared invocation-order log for updater doubles
pub fn shared_order() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

/// A resolver that returns scripted results
///
/// Queued responses are consumed first; once exhausted, the fallback is
/// returned on every call. Clones share state.
#[derive(Clone)]
pub struct ScriptedResolver {
    fallback: std::result::Result<Ipv4Addr, String>,
    queued: Arc<Mutex<VecDeque<std::result::Result<Ipv4Addr, String>>>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    /// Resolver that always succeeds with the given address
    pub fn always(addr: Ipv4Addr) -> Self {
        Self {
            fallback: Ok(addr),
            queued: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Resolver that always fails
    pub fn failing() -> Self {
        Self {
            fallback: Err("scripted resolver failure".to_string()),
            queued: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a one-shot response ahead of the fallback
    pub fn queue(&self, response: std::result::Result<Ipv4Addr, String>) {
        self.queued.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpResolver for ScriptedResolver {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let next = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        next.map_err(Error::resolver)
    }
}

/// A state store double that counts calls and can be made to fail reads
///
/// Wraps the real in-memory store so the singleton-row semantics stay
/// honest. Clones share state and counters.
#[derive(Clone)]
pub struct CountingStateStore {
    inner: MemoryStateStore,
    read_calls: Arc<AtomicUsize>,
    insert_calls: Arc<AtomicUsize>,
    update_calls: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
}

impl CountingStateStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStateStore::new(),
            read_calls: Arc::new(AtomicUsize::new(0)),
            insert_calls: Arc::new(AtomicUsize::new(0)),
            update_calls: Arc::new(AtomicUsize::new(0)),
            fail_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seed a baseline row without touching the call counters
    pub async fn seed(&self, addr: Ipv4Addr) -> CurrentIpRecord {
        self.inner.insert(addr).await.expect("seed into empty store")
    }

    /// Make every subsequent read fail
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub async fn stored_ip(&self) -> Option<Ipv4Addr> {
        self.inner
            .read_current()
            .await
            .expect("memory read never fails")
            .map(|r| r.ip)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for CountingStateStore {
    async fn read_current(&self) -> Result<Option<CurrentIpRecord>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::state_store("scripted read failure"));
        }
        self.inner.read_current().await
    }

    async fn insert(&self, addr: Ipv4Addr) -> Result<CurrentIpRecord> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(addr).await
    }

    async fn update(&self, record: &CurrentIpRecord, new_ip: Ipv4Addr) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update(record, new_ip).await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.inner.ensure_schema().await
    }
}

/// An updater double implementing both propagation traits
///
/// Records every `(old_ip, new_ip)` pair, appends its name to a shared
/// order log, and returns a scripted summary or error. Clones share
/// state.
#[derive(Clone)]
pub struct RecordingUpdater {
    name: &'static str,
    calls: Arc<Mutex<Vec<(Ipv4Addr, Ipv4Addr)>>>,
    order: Arc<Mutex<Vec<&'static str>>>,
    response: std::result::Result<UpdateSummary, String>,
}

impl RecordingUpdater {
    /// Updater that reports a clean single-item summary
    pub fn clean(name: &'static str, order: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self::with_summary(
            name,
            order,
            UpdateSummary {
                matched: 1,
                updated: 1,
                errors: 0,
            },
        )
    }

    /// Updater that reports the given summary
    pub fn with_summary(
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
        summary: UpdateSummary,
    ) -> Self {
        Self {
            name,
            calls: Arc::new(Mutex::new(Vec::new())),
            order,
            response: Ok(summary),
        }
    }

    /// Updater that fails wholesale
    pub fn failing(name: &'static str, order: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            name,
            calls: Arc::new(Mutex::new(Vec::new())),
            order,
            response: Err("scripted updater failure".to_string()),
        }
    }

    pub fn calls(&self) -> Vec<(Ipv4Addr, Ipv4Addr)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, old_ip: Ipv4Addr, new_ip: Ipv4Addr) -> Result<UpdateSummary> {
        self.order.lock().unwrap().push(self.name);
        self.calls.lock().unwrap().push((old_ip, new_ip));
        self.response
            .clone()
            .map_err(|message| Error::provider(self.name, message))
    }
}

#[async_trait]
impl RecordUpdater for RecordingUpdater {
    async fn update_records(&self, old_ip: Ipv4Addr, new_ip: Ipv4Addr) -> Result<UpdateSummary> {
        self.record(old_ip, new_ip)
    }
}

#[async_trait]
impl AccessRuleUpdater for RecordingUpdater {
    async fn update_access_rules(
        &self,
        old_ip: Ipv4Addr,
        new_ip: Ipv4Addr,
    ) -> Result<UpdateSummary> {
        self.record(old_ip, new_ip)
    }
}
