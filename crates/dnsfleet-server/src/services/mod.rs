// ============================================
// File: crates/dnsfleet-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Long-lived state and background work of the coordinator, kept apart
//! from the per-request cluster operations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`cursor`]: Pagination cursor table with TTL reaping
//! - [`broker`]: Topic publish/subscribe with a subscriber signal
//! - [`health`]: Subscriber-gated health polling
//! - [`stream`]: Heartbeat-paced subscriber streams
//! - [`blocking`]: Fleet blocking summary
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐  publish   ┌─────────────────────────┐ │
//! │  │  HealthMonitor  │──────────► │      EventBroker        │ │
//! │  │  - auth sweeps  │ ◄───────── │  - topic channels       │ │
//! │  │  - phases       │  changed   │  - subscriber counter   │ │
//! │  └────────┬────────┘            └────────────┬────────────┘ │
//! │           │ fan-out                          │ subscribe    │
//! │           ▼                                  ▼              │
//! │  ┌─────────────────┐            ┌─────────────────────────┐ │
//! │  │     Cluster     │──────────► │      EventStream        │ │
//! │  │                 │  cursors   │  - events / heartbeat   │ │
//! │  └─────────────────┘            └─────────────────────────┘ │
//! │           │                                                 │
//! │           ▼                                                 │
//! │  ┌─────────────────┐                                        │
//! │  │  CursorManager  │                                        │
//! │  └─────────────────┘                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every background loop takes a `broadcast::Receiver<()>` for shutdown
//! - The broker and monitor are shared by `Clone`/`Arc`, never globals
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod blocking;
pub mod broker;
pub mod cursor;
pub mod health;
pub mod stream;

// Re-export primary types
pub use blocking::{BlockingMode, BlockingSummary, ClusterBlocking};
pub use broker::{Event, EventBroker, Subscription};
pub use cursor::{CursorManager, CursorState};
pub use health::{HealthMonitor, HealthRecord, HealthStatus, HealthSummary, MonitorPhase};
pub use stream::{parse_topics, EventStream, Frame};
