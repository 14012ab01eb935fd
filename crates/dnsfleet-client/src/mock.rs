// ============================================
// File: crates/dnsfleet-client/src/mock.rs
// ============================================
//! # Mock Node Implementation
//!
//! ## Creation Reason
//! Provides an in-memory `NodeApi` for testing the cluster, the health
//! monitor and anything else built on nodes, without HTTP.
//!
//! ## Main Functionality
//! - In-memory rule store and blocking state
//! - Scriptable query log pages
//! - Injectable failures, delays and panics
//! - Call capture for verification
//!
//! ## Usage in Tests
//! ```ignore
//! use dnsfleet_client::mock::MockNode;
//! use dnsfleet_client::NodeApi;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let node = MockNode::new(1, "den");
//! let state = node.blocking_status().await.unwrap();
//! assert_eq!(node.calls().len(), 1);
//! # let _ = state;
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Delays use `tokio::time::sleep`, so paused-clock tests stay fast
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dnsfleet_common::NodeIdentity;
use parking_lot::Mutex;

use crate::config::NodeConnectionConfig;
use crate::error::{NodeError, Result};
use crate::models::{
    AddDomainRuleResponse, AuthStatus, BlockingParams, BlockingState, BlockingStatus, DomainRule,
    DomainRulesResponse, Processed, ProcessedItem, QueryLogResponse,
};
use crate::query::QueryLogRequest;
use crate::rule::{AddDomainRule, DomainRuleFilter, RemoveDomainRule};
use crate::traits::NodeApi;

type QueryHandler = Arc<dyn Fn(&QueryLogRequest) -> Result<QueryLogResponse> + Send + Sync>;

// ============================================
// MockCall
// ============================================

/// A call recorded by `MockNode`.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `fetch_query_logs`
    FetchQueryLogs(QueryLogRequest),
    /// `get_domain_rules`
    GetDomainRules(DomainRuleFilter),
    /// `add_domain_rule`
    AddDomainRule(AddDomainRule),
    /// `remove_domain_rule`
    RemoveDomainRule(RemoveDomainRule),
    /// `auth_status`
    AuthStatus,
    /// `blocking_status`
    BlockingStatus,
    /// `set_blocking`
    SetBlocking(BlockingParams),
    /// `logout`
    Logout,
}

// ============================================
// MockNode
// ============================================

struct MockState {
    identity: NodeIdentity,
    failure: Option<NodeError>,
    delay: Option<Duration>,
    panic: bool,
    auth_valid: bool,
    took_secs: f64,
    blocking: BlockingState,
    rules: Vec<DomainRule>,
    next_rule_id: i64,
    query_handler: Option<QueryHandler>,
    calls: Vec<MockCall>,
    config_updates: usize,
}

/// In-memory node for testing.
///
/// # Features
/// - No network access
/// - Every behavior can be changed while the node is in use
/// - Records every call in order
pub struct MockNode {
    state: Mutex<MockState>,
}

impl MockNode {
    /// Creates a healthy node with host `mock-{id}`.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MockState {
                identity: NodeIdentity::new(id, name, format!("mock-{id}")),
                failure: None,
                delay: None,
                panic: false,
                auth_valid: true,
                took_secs: 0.001,
                blocking: BlockingState {
                    status: BlockingStatus::Enabled,
                    timer_secs: None,
                    took_ms: 0.1,
                },
                rules: Vec::new(),
                next_rule_id: 1,
                query_handler: None,
                calls: Vec::new(),
                config_updates: 0,
            }),
        }
    }

    /// Makes every call fail with `error`, or succeed again with `None`.
    pub fn set_failure(&self, error: Option<NodeError>) {
        self.state.lock().failure = error;
    }

    /// Delays every call by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Makes every call panic.
    pub fn set_panic(&self, panic: bool) {
        self.state.lock().panic = panic;
    }

    /// Sets what `auth_status` reports.
    pub fn set_auth_valid(&self, valid: bool) {
        self.state.lock().auth_valid = valid;
    }

    /// Sets the `took` value (seconds) reported by `auth_status`.
    pub fn set_took(&self, took_secs: f64) {
        self.state.lock().took_secs = took_secs;
    }

    /// Sets the reported blocking state.
    pub fn set_blocking_state(&self, state: BlockingState) {
        self.state.lock().blocking = state;
    }

    /// Installs the function answering `fetch_query_logs`.
    ///
    /// Without a handler the node returns an empty page that echoes the
    /// request cursor.
    pub fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&QueryLogRequest) -> Result<QueryLogResponse> + Send + Sync + 'static,
    {
        self.state.lock().query_handler = Some(Arc::new(handler));
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the recorded query log requests.
    #[must_use]
    pub fn query_requests(&self) -> Vec<QueryLogRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::FetchQueryLogs(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns how many times `update_config` was called.
    #[must_use]
    pub fn config_updates(&self) -> usize {
        self.state.lock().config_updates
    }

    /// Returns the rules currently stored.
    #[must_use]
    pub fn rules(&self) -> Vec<DomainRule> {
        self.state.lock().rules.clone()
    }

    /// Records `call` and applies injected behavior.
    async fn enter(&self, call: MockCall) -> Result<()> {
        let (delay, failure, panic) = {
            let mut state = self.state.lock();
            state.calls.push(call);
            (state.delay, state.failure.clone(), state.panic)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        assert!(!panic, "mock node configured to panic");
        failure.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for MockNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNode")
            .field("identity", &self.state.lock().identity)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NodeApi for MockNode {
    fn identity(&self) -> NodeIdentity {
        self.state.lock().identity.clone()
    }

    fn update_config(&self, config: NodeConnectionConfig) {
        let mut state = self.state.lock();
        state.identity = config.identity();
        state.config_updates += 1;
    }

    async fn fetch_query_logs(&self, request: &QueryLogRequest) -> Result<QueryLogResponse> {
        self.enter(MockCall::FetchQueryLogs(request.clone())).await?;
        let handler = self.state.lock().query_handler.clone();
        match handler {
            Some(handler) => handler(request),
            None => Ok(QueryLogResponse {
                cursor: request.cursor,
                ..QueryLogResponse::default()
            }),
        }
    }

    async fn get_domain_rules(&self, filter: &DomainRuleFilter) -> Result<DomainRulesResponse> {
        self.enter(MockCall::GetDomainRules(filter.clone())).await?;
        let state = self.state.lock();
        let domains = state
            .rules
            .iter()
            .filter(|r| filter.rule_type.map_or(true, |t| t == r.rule_type))
            .filter(|r| filter.kind.map_or(true, |k| k == r.kind))
            .filter(|r| filter.domain.as_deref().map_or(true, |d| d.is_empty() || d == r.domain))
            .cloned()
            .collect();
        Ok(DomainRulesResponse {
            domains,
            took: state.took_secs,
        })
    }

    async fn add_domain_rule(&self, rule: &AddDomainRule) -> Result<AddDomainRuleResponse> {
        self.enter(MockCall::AddDomainRule(rule.clone())).await?;
        let mut state = self.state.lock();
        let mut added = Vec::new();
        let mut processed = Processed::default();
        for domain in &rule.domains {
            let id = state.next_rule_id;
            state.next_rule_id += 1;
            let stored = DomainRule {
                domain: domain.clone(),
                unicode: None,
                rule_type: rule.rule_type,
                kind: rule.kind,
                comment: rule.comment.clone(),
                groups: if rule.groups.is_empty() { vec![0] } else { rule.groups.clone() },
                enabled: rule.enabled,
                id,
                date_added: 0,
                date_modified: 0,
            };
            state.rules.push(stored.clone());
            added.push(stored);
            processed.success.push(ProcessedItem { item: domain.clone() });
        }
        Ok(AddDomainRuleResponse {
            domains: added,
            processed,
            took: state.took_secs,
        })
    }

    async fn remove_domain_rule(&self, rule: &RemoveDomainRule) -> Result<()> {
        self.enter(MockCall::RemoveDomainRule(rule.clone())).await?;
        let mut state = self.state.lock();
        let before = state.rules.len();
        state
            .rules
            .retain(|r| !(r.rule_type == rule.rule_type && r.kind == rule.kind && r.domain == rule.domain));
        if state.rules.len() == before {
            return Err(NodeError::from_status(404));
        }
        Ok(())
    }

    async fn auth_status(&self) -> Result<AuthStatus> {
        self.enter(MockCall::AuthStatus).await?;
        let state = self.state.lock();
        Ok(AuthStatus {
            valid: state.auth_valid,
            validity_seconds: if state.auth_valid { 300 } else { 0 },
            valid_until: dnsfleet_common::Timestamp::now(),
            took_ms: crate::models::took_to_millis(state.took_secs),
        })
    }

    async fn blocking_status(&self) -> Result<BlockingState> {
        self.enter(MockCall::BlockingStatus).await?;
        Ok(self.state.lock().blocking.clone())
    }

    async fn set_blocking(&self, params: &BlockingParams) -> Result<BlockingState> {
        self.enter(MockCall::SetBlocking(*params)).await?;
        let mut state = self.state.lock();
        state.blocking = BlockingState {
            status: if params.blocking {
                BlockingStatus::Enabled
            } else {
                BlockingStatus::Disabled
            },
            timer_secs: params.timer.map(|t| t as f64),
            took_ms: 0.1,
        };
        Ok(state.blocking.clone())
    }

    async fn logout(&self) -> Result<()> {
        self.enter(MockCall::Logout).await
    }
}

// ============================================
// Tests
// ============================================
