// ============================================
// File: crates/dnsfleet-server/src/services/cursor.rs
// ============================================
//! # Pagination Cursor Table
//!
//! ## Creation Reason
//! A multi-node query log search is resumed page by page. The per-node
//! offsets and the original search parameters live here, keyed by an
//! opaque random `CursorId` that callers hand back on the next call.
//!
//! ## Main Functionality
//! - `CursorManager`: TTL-bound table of `CursorState`s
//! - Lazy reaping on lookup, plus a periodic background reaper
//!
//! ## Cursor Lifecycle
//! ```text
//! ┌──────────┐  create   ┌────────┐   ttl elapsed   ┌─────────┐
//! │  (none)  │ ────────► │  Live  │ ──────────────► │ Expired │
//! └──────────┘           └────────┘                 └────┬────┘
//!                                                        │ get / reap
//!                                                        ▼
//!                                                   ┌─────────┐
//!                                                   │ Removed │
//!                                                   └─────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All operations take the one table lock; keep critical sections short
//! - Entries are immutable once created; progress always mints a new id
//! - Uses `tokio::time::Instant` so TTL tests can run on a paused clock
//!
//! ## Last Modified
//! v0.1.0 - Initial cursor table

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use dnsfleet_common::{CursorId, NodeId};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

// ============================================
// CursorState
// ============================================

/// What a cursor remembers about a search.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorState<T> {
    /// Parameters of the first call of the search
    pub params: T,
    /// Last known offset per node
    pub offsets: BTreeMap<NodeId, i64>,
}

struct Entry<T> {
    state: CursorState<T>,
    expires_at: Instant,
}

// ============================================
// CursorManager
// ============================================

/// TTL-bound table of pagination cursors.
///
/// # Thread Safety
/// All operations are linearized under one mutex.
pub struct CursorManager<T> {
    entries: Mutex<HashMap<CursorId, Entry<T>>>,
    ttl: Duration,
}

impl<T: Clone> CursorManager<T> {
    /// Creates an empty table whose cursors live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores a new cursor and returns its id.
    pub fn create(&self, params: T, offsets: BTreeMap<NodeId, i64>) -> CursorId {
        let mut entries = self.entries.lock();
        // 128 random bits; the loop only guards the theoretical collision
        let mut id = CursorId::generate();
        while entries.contains_key(&id) {
            id = CursorId::generate();
        }
        entries.insert(
            id,
            Entry {
                state: CursorState { params, offsets },
                expires_at: Instant::now() + self.ttl,
            },
        );
        debug!(cursor = %id, live = entries.len(), "Cursor created");
        id
    }

    /// Looks up a cursor.
    ///
    /// An expired cursor is removed and reported as missing.
    pub fn get(&self, id: &CursorId) -> Option<CursorState<T>> {
        let mut entries = self.entries.lock();
        let expired = entries.get(id)?.expires_at <= Instant::now();
        if expired {
            entries.remove(id);
            debug!(cursor = %id, "Cursor expired on lookup");
            return None;
        }
        entries.get(id).map(|e| e.state.clone())
    }

    /// Removes every expired cursor and returns how many were removed.
    pub fn reap_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Number of stored cursors, including expired ones not yet reaped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no cursor is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes every cursor.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Cursor lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reaps expired cursors every `interval` until shutdown.
    pub async fn run_reaper(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        info!("Cursor reaper started ({}s)", interval.as_secs());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => { info!("Cursor reaper stopping"); break; }
                _ = ticker.tick() => {
                    let removed = self.reap_expired();
                    if removed > 0 {
                        debug!(removed, live = self.len(), "Reaped expired cursors");
                    }
                }
            }
        }
    }
}

impl<T> std::fmt::Debug for CursorManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorManager")
            .field("live", &self.entries.lock().len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn offsets(pairs: &[(i64, i64)]) -> BTreeMap<NodeId, i64> {
        pairs.iter().map(|(n, o)| (NodeId::new(*n), *o)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_and_get() {
        let manager = CursorManager::new(Duration::from_secs(300));
        let id = manager.create("filters", offsets(&[(1, 10), (2, 7)]));

        let state = manager.get(&id).unwrap();
        assert_eq!(state.params, "filters");
        assert_eq!(state.offsets, offsets(&[(1, 10), (2, 7)]));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_unique() {
        let manager = CursorManager::new(Duration::from_secs(300));
        let a = manager.create((), BTreeMap::new());
        let b = manager.create((), BTreeMap::new());
        assert_ne!(a, b);
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lookup_removes_entry() {
        let manager = CursorManager::new(Duration::from_secs(300));
        let id = manager.create(1u8, BTreeMap::new());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(manager.get(&id).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(manager.get(&id).is_none());
        assert!(manager.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_id() {
        let manager: CursorManager<()> = CursorManager::new(Duration::from_secs(1));
        assert!(manager.get(&CursorId::generate()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_expired_only_removes_old() {
        let manager = CursorManager::new(Duration::from_secs(60));
        manager.create("old", BTreeMap::new());
        tokio::time::advance(Duration::from_secs(45)).await;
        let young = manager.create("young", BTreeMap::new());
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(manager.reap_expired(), 1);
        assert_eq!(manager.len(), 1);
        assert!(manager.get(&young).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_reaper() {
        let manager = Arc::new(CursorManager::new(Duration::from_secs(10)));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let reaper = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.run_reaper(Duration::from_secs(5), shutdown_rx).await })
        };

        manager.create((), BTreeMap::new());
        tokio::time::sleep(Duration::from_secs(16)).await;
        // Reaped without any lookup
        assert_eq!(manager.len(), 0);

        shutdown_tx.send(()).unwrap();
        reaper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let manager = CursorManager::new(Duration::from_secs(10));
        manager.create((), BTreeMap::new());
        manager.clear();
        assert!(manager.is_empty());
    }
}
