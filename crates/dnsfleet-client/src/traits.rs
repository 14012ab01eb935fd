// ============================================
// File: crates/dnsfleet-client/src/traits.rs
// ============================================
//! # Node API Trait
//!
//! ## Creation Reason
//! The cluster and the health monitor talk to nodes only through
//! `NodeApi`, so they can be tested against `MockNode` without any HTTP.
//!
//! ## Main Functionality
//! - `NodeApi`: One upstream node (query log, rules, auth, blocking)
//!
//! ## Design Philosophy
//! - Async methods via `async_trait`, object safe for `Arc<dyn NodeApi>`
//! - Every failure is already classified as `NodeError`
//! - Implementations own their session handling; callers never see tokens
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync
//! - `update_config` must take effect for the next call without a restart
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use async_trait::async_trait;
use dnsfleet_common::NodeIdentity;

use crate::config::NodeConnectionConfig;
use crate::error::Result;
use crate::models::{
    AddDomainRuleResponse, AuthStatus, BlockingParams, BlockingState, DomainRulesResponse,
    QueryLogResponse,
};
use crate::query::QueryLogRequest;
use crate::rule::{AddDomainRule, DomainRuleFilter, RemoveDomainRule};

/// Interface to one upstream DNS filter node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Returns the current identity of the node.
    fn identity(&self) -> NodeIdentity;

    /// Replaces the connection settings.
    ///
    /// Calls already in flight finish with the settings they started with.
    fn update_config(&self, config: NodeConnectionConfig);

    /// Fetches one page of the query log.
    async fn fetch_query_logs(&self, request: &QueryLogRequest) -> Result<QueryLogResponse>;

    /// Lists domain rules.
    async fn get_domain_rules(&self, filter: &DomainRuleFilter) -> Result<DomainRulesResponse>;

    /// Adds domain rules.
    async fn add_domain_rule(&self, rule: &AddDomainRule) -> Result<AddDomainRuleResponse>;

    /// Removes one domain rule.
    async fn remove_domain_rule(&self, rule: &RemoveDomainRule) -> Result<()>;

    /// Checks the session against the node, logging in first if needed.
    async fn auth_status(&self) -> Result<AuthStatus>;

    /// Reads the blocking state.
    async fn blocking_status(&self) -> Result<BlockingState>;

    /// Changes the blocking state.
    async fn set_blocking(&self, params: &BlockingParams) -> Result<BlockingState>;

    /// Ends the current session, if any.
    async fn logout(&self) -> Result<()>;
}
