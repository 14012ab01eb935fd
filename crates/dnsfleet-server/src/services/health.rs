// ============================================
// File: crates/dnsfleet-server/src/services/health.rs
// ============================================
//! # Node Health Monitor
//!
//! ## Creation Reason
//! Dashboards show whether each node is reachable and authenticated. The
//! monitor polls session status across the cluster while anyone is
//! watching and broadcasts the result through the event broker.
//!
//! ## Main Functionality
//! - `sweep_once`: one auth-status fan-out folded into health records
//! - `run`: subscriber-gated polling loop
//! - `summary` / `node_health`: latest snapshot for direct reads
//!
//! ## Scheduler States
//! ```text
//!            subscriber appears (sweep now)
//!   ┌──────┐ ─────────────────────────────► ┌────────┐
//!   │ Idle │                                │ Active │ ◄─┐ tick: sweep
//!   └──────┘ ◄──── grace = 0 ────────────── └───┬────┘ ──┘
//!      ▲                                        │ last subscriber left
//!      │ grace elapsed                          ▼
//!      │                                  ┌──────────┐
//!      └───────────────────────────────── │ Draining │ tick: sweep
//!                                         └────┬─────┘
//!                     subscriber reappears     │
//!                     (back to Active) ◄───────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The broker's change signal is coalesced; always re-read the count
//! - Ticks are jittered by ±20%
//! - Records of nodes missing from a sweep are dropped in that sweep
//!
//! ## Last Modified
//! v0.1.0 - Initial health monitor

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dnsfleet_client::AuthStatus;
use dnsfleet_common::time::jitter;
use dnsfleet_common::{NodeId, NodeIdentity, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::cluster::{Cluster, NodeResult};
use crate::config::HealthConfig;
use crate::services::broker::{EventBroker, TOPIC_HEALTH_SUMMARY, TOPIC_NODE_HEALTH};

const JITTER_FRACTION: f64 = 0.2;

// ============================================
// Records
// ============================================

/// Health classification of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Reachable with a valid session
    Online,
    /// Reachable but the session is not valid
    Degraded,
    /// Not reachable or answered with an error
    Offline,
}

/// Latest health observation of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    /// Node identity
    #[serde(flatten)]
    pub node: NodeIdentity,
    /// Classification
    pub status: HealthStatus,
    /// Server-side processing time of the status call
    pub latency_ms: Option<f64>,
    /// Failure message when offline
    pub last_error: Option<String>,
    /// When this record was produced
    pub updated_at: Timestamp,
}

impl HealthRecord {
    fn from_result(result: &NodeResult<AuthStatus>, now: Timestamp) -> Self {
        let (status, latency_ms, last_error) = match (result.response(), result.error()) {
            (Some(auth), _) if auth.valid => (HealthStatus::Online, Some(auth.took_ms), None),
            (Some(auth), _) => (HealthStatus::Degraded, Some(auth.took_ms), None),
            (None, error) => (
                HealthStatus::Offline,
                None,
                Some(error.map_or_else(|| "no response".to_owned(), ToString::to_string)),
            ),
        };
        Self {
            node: result.node().clone(),
            status,
            latency_ms,
            last_error,
            updated_at: now,
        }
    }
}

/// Fleet-wide health counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    /// Nodes currently online
    pub online: usize,
    /// Nodes with a record
    pub total: usize,
    /// When the counters were computed
    pub updated_at: Timestamp,
}

/// Scheduler state of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// No subscribers, not polling
    Idle,
    /// Polling for present subscribers
    Active,
    /// Polling until the grace period ends
    Draining,
}

#[derive(Default)]
struct HealthState {
    records: BTreeMap<NodeId, HealthRecord>,
    summary: HealthSummary,
}

impl HealthState {
    fn recompute(&mut self, now: Timestamp) {
        self.summary = HealthSummary {
            online: self
                .records
                .values()
                .filter(|r| r.status == HealthStatus::Online)
                .count(),
            total: self.records.len(),
            updated_at: now,
        };
    }
}

// ============================================
// HealthMonitor
// ============================================

/// Subscriber-gated health poller.
pub struct HealthMonitor {
    cluster: Arc<Cluster>,
    broker: EventBroker,
    interval: Duration,
    grace: Duration,
    state: Mutex<HealthState>,
    phase: Mutex<MonitorPhase>,
    sweeps: AtomicU64,
}

impl HealthMonitor {
    /// Creates an idle monitor.
    #[must_use]
    pub fn new(cluster: Arc<Cluster>, broker: EventBroker, config: &HealthConfig) -> Self {
        Self {
            cluster,
            broker,
            interval: config.polling_interval().max(Duration::from_secs(1)),
            grace: config.grace_period(),
            state: Mutex::new(HealthState::default()),
            phase: Mutex::new(MonitorPhase::Idle),
            sweeps: AtomicU64::new(0),
        }
    }

    /// Polls every node once, updates the records and publishes them.
    pub async fn sweep_once(&self) {
        let results = self.cluster.auth_status().await;
        let now = Timestamp::now();

        let (records, summary) = {
            let mut state = self.state.lock();
            // Membership may have changed while the fan-out was in flight
            state
                .records
                .retain(|id, _| results.contains_key(id) && self.cluster.has_client(*id));
            for (id, result) in &results {
                if self.cluster.has_client(*id) {
                    state.records.insert(*id, HealthRecord::from_result(result, now));
                }
            }
            state.recompute(now);
            (state.records.values().cloned().collect::<Vec<_>>(), state.summary)
        };
        let sweep = self.sweeps.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(sweep, online = summary.online, total = summary.total, "Health sweep done");

        self.publish(&records, summary);
    }

    /// Drops the record of a node that left the cluster.
    pub fn forget(&self, id: NodeId) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.records.remove(&id).is_none() {
                return;
            }
            state.recompute(Timestamp::now());
            (state.records.values().cloned().collect::<Vec<_>>(), state.summary)
        };
        debug!(node_id = %id, "Health record dropped");
        self.publish(&snapshot.0, snapshot.1);
    }

    fn publish(&self, records: &[HealthRecord], summary: HealthSummary) {
        match serde_json::to_string(records) {
            Ok(payload) => {
                self.broker.publish(TOPIC_NODE_HEALTH, payload);
            }
            Err(e) => warn!("Failed to serialize node health: {}", e),
        }
        match serde_json::to_string(&summary) {
            Ok(payload) => {
                self.broker.publish(TOPIC_HEALTH_SUMMARY, payload);
            }
            Err(e) => warn!("Failed to serialize health summary: {}", e),
        }
    }

    /// Latest fleet counters.
    #[must_use]
    pub fn summary(&self) -> HealthSummary {
        self.state.lock().summary
    }

    /// Latest record of every node, ordered by node id.
    #[must_use]
    pub fn node_health(&self) -> Vec<HealthRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    /// Current scheduler state.
    #[must_use]
    pub fn phase(&self) -> MonitorPhase {
        *self.phase.lock()
    }

    /// Number of sweeps performed so far.
    #[must_use]
    pub fn sweep_count(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    fn set_phase(&self, phase: MonitorPhase) {
        let mut current = self.phase.lock();
        if *current != phase {
            debug!(from = ?*current, to = ?phase, "Health monitor phase change");
            *current = phase;
        }
    }

    fn next_tick(&self) -> Instant {
        Instant::now() + jitter(self.interval, JITTER_FRACTION)
    }

    // ========================================
    // Polling loop
    // ========================================

    /// Runs the polling loop until shutdown.
    ///
    /// Performs one warm-up sweep so direct reads have data before the
    /// first subscriber arrives.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Health monitor started (interval {}s, grace {}s)",
            self.interval.as_secs(),
            self.grace.as_secs()
        );
        self.sweep_once().await;

        let mut tick = self.next_tick();
        let mut grace_deadline: Option<Instant> = None;

        if self.broker.subscriber_count() > 0 {
            self.set_phase(MonitorPhase::Active);
        }

        loop {
            let wake = match self.phase() {
                MonitorPhase::Idle => None,
                MonitorPhase::Active => Some(tick),
                MonitorPhase::Draining => grace_deadline.map(|g| g.min(tick)),
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Health monitor stopping");
                    break;
                }
                () = self.broker.changed() => {
                    let subscribers = self.broker.subscriber_count();
                    match (self.phase(), subscribers > 0) {
                        (MonitorPhase::Idle, true) => {
                            self.set_phase(MonitorPhase::Active);
                            self.sweep_once().await;
                            tick = self.next_tick();
                        }
                        (MonitorPhase::Draining, true) => {
                            grace_deadline = None;
                            self.set_phase(MonitorPhase::Active);
                        }
                        (MonitorPhase::Active, false) if self.grace.is_zero() => {
                            self.set_phase(MonitorPhase::Idle);
                        }
                        (MonitorPhase::Active, false) => {
                            grace_deadline = Some(Instant::now() + self.grace);
                            self.set_phase(MonitorPhase::Draining);
                        }
                        _ => {}
                    }
                }
                () = sleep_until(wake) => {
                    let now = Instant::now();
                    if grace_deadline.is_some_and(|g| now >= g) {
                        grace_deadline = None;
                        if self.broker.subscriber_count() == 0 {
                            self.set_phase(MonitorPhase::Idle);
                            continue;
                        }
                        self.set_phase(MonitorPhase::Active);
                    }
                    if now >= tick {
                        self.sweep_once().await;
                        tick = self.next_tick();
                    }
                }
            }
        }

        self.set_phase(MonitorPhase::Idle);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("interval", &self.interval)
            .field("grace", &self.grace)
            .field("phase", &self.phase())
            .field("summary", &self.summary())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
