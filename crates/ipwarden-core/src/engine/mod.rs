//! Core poll engine
//!
//! The PollEngine is responsible for:
//! - Resolving the host's public IP once per cycle via IpResolver
//! - Comparing it against the persisted baseline in StateStore
//! - Driving the two downstream updaters on change
//! - Persisting the newly observed IP
//! - Sleeping with jitter between cycles
//!
//! ## Cycle Flow
//!
//! ```text
//! IDLE ──> CHECKING ──> UNCHANGED ──────────────────────┐
//!                  └──> CHANGED ──> RecordUpdater       │
//!                                   AccessRuleUpdater   │
//!                                   StateStore.update ──┤
//!                                                       ▼
//!                                              jittered sleep
//! ```
//!
//! DNS runs before firewall, unconditionally: the firewall pass is not
//! gated on DNS success. The baseline is persisted regardless of either
//! outcome: it tracks the last *observed* IP, so propagation failures
//! are logged but never retried by re-comparison.

use crate::config::PollConfig;
use crate::error::Result;
use crate::traits::{AccessRuleUpdater, IpResolver, RecordUpdater, StateStore, UpdateSummary};
use rand::Rng;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the PollEngine
///
/// Observability only: the daemon logs these, and any future alerting
/// consumer would subscribe to the same channel. Nothing in the engine
/// branches on whether an event was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started,

    /// First run: the resolved IP became the stored baseline
    BaselineEstablished { ip: Ipv4Addr },

    /// The resolved IP matched the stored baseline
    IpUnchanged { ip: Ipv4Addr },

    /// The resolved IP differs from the stored baseline
    IpChangeDetected { old_ip: Ipv4Addr, new_ip: Ipv4Addr },

    /// DNS record propagation finished
    DnsPropagated {
        old_ip: Ipv4Addr,
        new_ip: Ipv4Addr,
        summary: UpdateSummary,
    },

    /// Firewall allowlist propagation finished
    FirewallPropagated {
        old_ip: Ipv4Addr,
        new_ip: Ipv4Addr,
        summary: UpdateSummary,
    },

    /// The stored baseline was moved to the newly observed IP
    BaselineMoved { old_ip: Ipv4Addr, new_ip: Ipv4Addr },

    /// A poll cycle aborted with an error (loop continues)
    CycleFailed { error: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// Core poll engine
///
/// Runs strictly sequentially: one cycle at a time, no concurrent
/// cycles, no concurrent updater invocations. The only suspension point
/// between cycles is the jittered sleep.
///
/// ## Lifecycle
///
/// 1. Create with [`PollEngine::new()`]
/// 2. Start with [`PollEngine::run()`]
/// 3. Engine runs until a shutdown signal is received
pub struct PollEngine {
    /// Resolver for the host's public IP
    resolver: Box<dyn IpResolver>,

    /// Persisted baseline
    store: Box<dyn StateStore>,

    /// DNS A-record updater
    record_updater: Box<dyn RecordUpdater>,

    /// Firewall allowlist-rule updater
    access_rule_updater: Box<dyn AccessRuleUpdater>,

    /// Base interval between cycles
    interval: Duration,

    /// Maximum jitter either side of the interval
    jitter: Duration,

    /// Set until the first successful resolution has been logged
    awaiting_first_resolution: AtomicBool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl PollEngine {
    /// Create a new poll engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields
    /// engine events for logging or monitoring.
    pub fn new(
        resolver: Box<dyn IpResolver>,
        store: Box<dyn StateStore>,
        record_updater: Box<dyn RecordUpdater>,
        access_rule_updater: Box<dyn AccessRuleUpdater>,
        config: PollConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            resolver,
            store,
            record_updater,
            access_rule_updater,
            interval: Duration::from_secs(config.interval_secs),
            jitter: Duration::from_secs(config.jitter_secs),
            awaiting_first_resolution: AtomicBool::new(true),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine until SIGINT
    ///
    /// The loop is infinite in normal operation; process termination is
    /// the only way to stop it outside of tests.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// Tests pass a oneshot receiver to terminate the loop
    /// deterministically after N cycles; production code should use
    /// [`run()`](Self::run) instead.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(EngineEvent::Started);

        if let Some(mut rx) = shutdown_rx {
            // Test mode: stop when the provided signal fires
            loop {
                self.contain_cycle().await;

                let delay = jittered_delay(self.interval, self.jitter);
                debug!("next check in {}s", delay.as_secs());

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut rx => {
                        info!("shutdown signal received");
                        self.emit_event(EngineEvent::Stopped {
                            reason: "shutdown signal".to_string(),
                        });
                        return Ok(());
                    }
                }
            }
        } else {
            // Production mode: stop on SIGINT or SIGTERM
            loop {
                self.contain_cycle().await;

                let delay = jittered_delay(self.interval, self.jitter);
                info!("next check in {}s", delay.as_secs());

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    signal = shutdown_signal() => {
                        info!("{signal} received");
                        self.emit_event(EngineEvent::Stopped {
                            reason: signal.to_string(),
                        });
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run one cycle, containing any error at the loop boundary
    ///
    /// The process must never exit due to a transient cycle error: the
    /// failure is logged, surfaced as an event, and the loop proceeds
    /// to the sleep step.
    async fn contain_cycle(&self) {
        if let Err(e) = self.run_once().await {
            error!("poll cycle failed: {e}");
            self.emit_event(EngineEvent::CycleFailed {
                error: e.to_string(),
            });
        }
    }

    /// Execute a single poll cycle
    ///
    /// Public so embedders (and contract tests) can drive the engine
    /// one cycle at a time without the sleep schedule.
    pub async fn run_once(&self) -> Result<()> {
        // Step 1: resolve. A resolver failure ends the cycle without
        // touching any state; the next scheduled cycle is the retry.
        let ip = match self.resolver.resolve().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("failed to resolve public IP: {e}");
                return Ok(());
            }
        };

        if self.awaiting_first_resolution.swap(false, Ordering::SeqCst) {
            info!("current public IP: {ip}");
        }

        // Step 2: compare against the stored baseline.
        match self.store.read_current().await? {
            None => {
                // First-run bootstrap: the resolved IP becomes the
                // baseline and no propagation happens.
                self.store.insert(ip).await?;
                info!("no baseline stored, setting baseline IP to {ip}");
                self.emit_event(EngineEvent::BaselineEstablished { ip });
            }
            Some(record) if record.ip != ip => {
                self.propagate_change(&record, ip).await?;
            }
            Some(record) => {
                debug!("public IP unchanged at {}", record.ip);
                self.emit_event(EngineEvent::IpUnchanged { ip });
            }
        }

        Ok(())
    }

    /// Drive both updaters and move the baseline
    ///
    /// The baseline update at the end is unconditional: it must run
    /// even when one or both propagation passes failed.
    async fn propagate_change(
        &self,
        record: &crate::traits::CurrentIpRecord,
        new_ip: Ipv4Addr,
    ) -> Result<()> {
        let old_ip = record.ip;
        info!("public IP changed from {old_ip} to {new_ip}");
        self.emit_event(EngineEvent::IpChangeDetected { old_ip, new_ip });

        // DNS first, firewall after, neither gated on the other.
        let dns = match self.record_updater.update_records(old_ip, new_ip).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("DNS record update from {old_ip} to {new_ip} failed: {e}");
                UpdateSummary::failure()
            }
        };
        if dns.is_clean() {
            info!(
                "DNS records updated from {old_ip} to {new_ip} ({} updated)",
                dns.updated
            );
        } else {
            error!(
                "failed to update DNS records from {old_ip} to {new_ip} \
                 ({} updated, {} errors)",
                dns.updated, dns.errors
            );
        }
        self.emit_event(EngineEvent::DnsPropagated {
            old_ip,
            new_ip,
            summary: dns,
        });

        let firewall = match self
            .access_rule_updater
            .update_access_rules(old_ip, new_ip)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                error!("firewall rule update from {old_ip} to {new_ip} failed: {e}");
                UpdateSummary::failure()
            }
        };
        if firewall.is_clean() {
            info!(
                "firewall access rules updated from {old_ip} to {new_ip} ({} updated)",
                firewall.updated
            );
        } else {
            warn!(
                "failed to update some firewall access rules from {old_ip} to {new_ip} \
                 ({} updated, {} errors)",
                firewall.updated, firewall.errors
            );
        }
        self.emit_event(EngineEvent::FirewallPropagated {
            old_ip,
            new_ip,
            summary: firewall,
        });

        // The baseline tracks the last observed IP, not the last
        // successfully propagated one.
        self.store.update(record, new_ip).await?;
        info!("baseline IP updated to {new_ip}");
        self.emit_event(EngineEvent::BaselineMoved { old_ip, new_ip });

        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Drop on a full channel rather than stalling the poll cycle.
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full, dropping event");
        }
    }
}

/// Wait for a termination signal
///
/// Watches both SIGINT and SIGTERM so a systemd stop produces the same
/// clean exit (with a `Stopped` event) as an interactive Ctrl-C.
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("failed to install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return "interrupt";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "interrupt",
        _ = sigterm.recv() => "terminate",
    }
}

/// Wait for a termination signal (SIGINT only)
///
/// Fallback for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}

/// Compute the sleep before the next cycle
///
/// Draws a uniform offset from the closed range `[-jitter, +jitter]`
/// and applies it to the base interval.
pub(crate) fn jittered_delay(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }

    let spread = jitter.as_secs() as i64;
    let offset = rand::thread_rng().gen_range(-spread..=spread);
    if offset >= 0 {
        base + Duration::from_secs(offset as u64)
    } else {
        base.saturating_sub(Duration::from_secs(offset.unsigned_abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let base = Duration::from_secs(300);
        let jitter = Duration::from_secs(60);

        for _ in 0..1000 {
            let delay = jittered_delay(base, jitter);
            assert!(
                delay >= Duration::from_secs(240) && delay <= Duration::from_secs(360),
                "delay {delay:?} outside [240s, 360s]"
            );
        }
    }

    #[test]
    fn jittered_delay_covers_the_range() {
        let base = Duration::from_secs(300);
        let jitter = Duration::from_secs(60);

        let mut seen_below = false;
        let mut seen_above = false;
        for _ in 0..1000 {
            let delay = jittered_delay(base, jitter);
            seen_below |= delay < base;
            seen_above |= delay > base;
        }
        assert!(seen_below, "jitter never went below the base interval");
        assert!(seen_above, "jitter never went above the base interval");
    }

    #[test]
    fn zero_jitter_is_exact() {
        let base = Duration::from_secs(300);
        assert_eq!(jittered_delay(base, Duration::ZERO), base);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn sigterm_handler_can_be_installed() {
        use tokio::signal::unix::{SignalKind, signal};

        // Actual delivery cannot be exercised in-process; this pins
        // that the handler the production loop relies on installs.
        assert!(signal(SignalKind::terminate()).is_ok());
    }

    #[tokio::test]
    async fn shutdown_signal_pends_until_a_signal_arrives() {
        let result =
            tokio::time::timeout(Duration::from_millis(100), shutdown_signal()).await;
        assert!(result.is_err(), "no signal was sent, the future must pend");
    }
}
