// ============================================
// File: crates/dnsfleet-client/src/lib.rs
// ============================================
//! # dnsfleet Client - Upstream Node Access
//!
//! ## Creation Reason
//! Provides access to individual DNS filter nodes over their HTTP API.
//! Everything above this crate sees a node only through the [`NodeApi`]
//! trait and classified [`NodeError`]s.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `NodeApi` trait definition
//! - [`client`]: HTTP implementation with session caching
//! - [`config`]: Connection settings and client options
//! - [`query`] / [`rule`]: Request types for the query log and domain rules
//! - [`models`]: Node response types
//! - [`error`]: Error classification
//! - `mock`: In-memory node (with `mock` feature)
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              dnsfleet-server                        │
//! │                    │                                │
//! │                    ▼                                │
//! │             dnsfleet-client  ◄── You are here       │
//! │                    │                                │
//! │                    ▼                                │
//! │             dnsfleet-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always use the trait for testability
//! - Mock implementation available with `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial client layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod rule;
mod session;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-exports
pub use client::NodeClient;
pub use config::{ClientOptions, NodeConnectionConfig, Scheme, Secret};
pub use error::{ErrorKind, NodeError, Result};
pub use models::{
    AddDomainRuleResponse, AuthStatus, BlockingParams, BlockingState, BlockingStatus, DnsLogEntry,
    DomainRule, DomainRulesResponse, QueryLogResponse,
};
pub use query::{QueryLogFilters, QueryLogRequest};
pub use rule::{AddDomainRule, DomainRuleFilter, RemoveDomainRule, RuleKind, RuleType};
pub use session::SESSION_LEEWAY;
pub use traits::NodeApi;
