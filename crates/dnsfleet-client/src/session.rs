// ============================================
// File: crates/dnsfleet-client/src/session.rs
// ============================================
//! # Session Cache
//!
//! ## Creation Reason
//! Nodes hand out a session id on login that stays valid for a while.
//! Logging in on every request would be slow and noisy, and several
//! concurrent requests must not all log in at once.
//!
//! ## Main Functionality
//! - Fast path: read the cached session under a shared lock
//! - Slow path: one refresher at a time, re-checking before logging in
//! - Invalidation after the node rejects a session
//!
//! ## Session Lifecycle
//! ```text
//! empty ──login──► valid ──(validity - leeway elapsed)──► stale ──login──► valid
//!                    │
//!                    └──(401/403, config change, logout)──► empty
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Sessions are tagged with the config generation they were created for;
//!   a session from an older generation is never reused
//! - Uses `tokio::time::Instant` so paused-clock tests can expire sessions
//!
//! ## Last Modified
//! v0.1.0 - Initial session cache

use std::future::Future;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use zeroize::Zeroize;

use crate::error::ClientError;

/// A session is treated as expired this long before the node would expire it.
pub const SESSION_LEEWAY: Duration = Duration::from_secs(5);

/// Longest validity trusted for one session.
const MAX_SESSION_VALIDITY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// ============================================
// CachedSession
// ============================================

struct CachedSession {
    sid: String,
    valid_until: Instant,
    generation: u64,
}

impl CachedSession {
    fn usable(&self, generation: u64, leeway: Duration) -> bool {
        self.generation == generation && Instant::now() + leeway < self.valid_until
    }
}

impl Drop for CachedSession {
    fn drop(&mut self) {
        self.sid.zeroize();
    }
}

// ============================================
// SessionCache
// ============================================

/// Single-flight cache of one node session.
pub(crate) struct SessionCache {
    cached: RwLock<Option<CachedSession>>,
    refresh: Mutex<()>,
    leeway: Duration,
}

impl SessionCache {
    pub(crate) fn new() -> Self {
        Self::with_leeway(SESSION_LEEWAY)
    }

    pub(crate) fn with_leeway(leeway: Duration) -> Self {
        Self {
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
            leeway,
        }
    }

    fn lookup(&self, generation: u64) -> Option<String> {
        self.cached
            .read()
            .as_ref()
            .filter(|s| s.usable(generation, self.leeway))
            .map(|s| s.sid.clone())
    }

    /// Returns a usable session id, calling `login` at most once among
    /// concurrent callers when none is cached.
    ///
    /// `login` yields the new id and how long it stays valid.
    pub(crate) async fn get_or_refresh<F, Fut>(
        &self,
        generation: u64,
        login: F,
    ) -> Result<String, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Duration), ClientError>>,
    {
        if let Some(sid) = self.lookup(generation) {
            return Ok(sid);
        }

        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited
        if let Some(sid) = self.lookup(generation) {
            return Ok(sid);
        }

        let (sid, validity) = login().await?;
        let mut cached = self.cached.write();
        // A caller holding an older config must not displace a newer session
        if cached.as_ref().is_some_and(|s| s.generation > generation) {
            return Ok(sid);
        }
        *cached = Some(CachedSession {
            sid: sid.clone(),
            valid_until: Instant::now() + validity.min(MAX_SESSION_VALIDITY),
            generation,
        });
        Ok(sid)
    }

    /// Drops the cached session if it is still `sid`.
    pub(crate) fn invalidate(&self, sid: &str) {
        let mut cached = self.cached.write();
        if cached.as_ref().is_some_and(|s| s.sid == sid) {
            *cached = None;
        }
    }

    /// Removes and returns the cached session id, usable or not.
    pub(crate) fn take(&self) -> Option<String> {
        self.cached.write().take().map(|s| s.sid.clone())
    }

    /// Drops any cached session.
    pub(crate) fn clear(&self) {
        *self.cached.write() = None;
    }
}

// ============================================
// Tests
// ============================================
