// ============================================
// File: crates/dnsfleet-common/src/lib.rs
// ============================================
//! # dnsfleet Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types and utilities shared across all dnsfleet
//! crates, so node identities, cursor ids and timestamps look the same in
//! the client and in the cluster coordinator.
//!
//! ## Main Functionality
//! - [`types`]: Identifiers (`NodeId`, `CursorId`) and `NodeIdentity`
//! - [`time`]: Unix timestamps and interval jitter
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              dnsfleet-server                        │
//! │                    │                                │
//! │                    ▼                                │
//! │             dnsfleet-client                         │
//! │                    │                                │
//! │                    ▼                                │
//! │             dnsfleet-common  ◄── You are here       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - `CursorId` is a capability token: always generate it from a secure RNG
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use time::Timestamp;
pub use types::{CursorId, NodeId, NodeIdentity};
