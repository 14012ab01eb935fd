// ============================================
// File: crates/dnsfleet-server/src/lib.rs
// ============================================
//! # dnsfleet Server Library
//!
//! ## Creation Reason
//! Coordinates a fleet of DNS filter nodes: one administrative call fans
//! out to every node, query log searches page across all of them, and
//! live health is pushed to subscribers.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Component wiring and lifecycle
//! - [`cluster`]: Membership, fan-out and query log pagination
//! - [`services`]: Long-lived services
//!   - [`services::cursor`]: Pagination cursor table
//!   - [`services::broker`]: Topic publish/subscribe
//!   - [`services::health`]: Health polling
//!   - [`services::stream`]: Subscriber event streams
//!   - [`services::blocking`]: Fleet blocking summary
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      dnsfleet Coordinator                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐  │
//! │  │   Config    │────►│   Server    │────►│  HealthMonitor  │  │
//! │  │             │     │ Orchestrator│     │                 │  │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘  │
//! │                             │                     │           │
//! │         ┌───────────────────┼─────────────────────┤           │
//! │         ▼                   ▼                     ▼           │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     │
//! │  │  Cursor     │◄────│   Cluster   │     │ EventBroker │     │
//! │  │  Manager    │     │   fan-out   │     │             │     │
//! │  └─────────────┘     └──────┬──────┘     └─────────────┘     │
//! │                             │                                 │
//! ├─────────────────────────────┼─────────────────────────────────┤
//! │                     Node Access Layer                         │
//! │  ┌──────────────────────────▼──────────────────────────────┐ │
//! │  │        NodeClient per node  (HTTP + session cache)       │ │
//! │  └──────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - No HTTP surface lives here; callers use `Cluster` and the services
//! - Configuration changes to `[[nodes]]` go through `Server` membership
//!   methods, not a file reload
//!
//! ## Last Modified
//! v0.1.0 - Initial coordinator library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod server;
pub mod services;

// Re-export primary types
pub use cluster::{Cluster, FanOut, FetchQueryLogs, NodeResult, QueryLogPage};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
