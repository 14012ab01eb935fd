// ============================================
// File: crates/dnsfleet-server/src/cluster/mod.rs
// ============================================
//! # Cluster Fan-Out
//!
//! ## Creation Reason
//! Every administrative operation targets the whole fleet. The cluster owns
//! the current membership and runs one operation against every member at
//! once, collecting a per-node envelope instead of failing on the first
//! bad node.
//!
//! ## Main Functionality
//! - `NodeResult`: uniform per-node outcome
//! - `Cluster`: membership table plus `fan_out`
//! - Typed fan-outs for domain rules, auth status, blocking and logout
//! - [`query_log`]: cursor-based query log pagination
//!
//! ## Fan-Out Flow
//! ```text
//!                 ┌──────────────┐
//!   fan_out(op) ─►│   snapshot   │ (membership lock held only here)
//!                 └──────┬───────┘
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!     spawn+timeout spawn+timeout spawn+timeout
//!          │             │             │
//!          └───────► join all ◄────────┘
//!                        │
//!                        ▼
//!            BTreeMap<NodeId, NodeResult<T>>
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The result map has one entry per member present at dispatch, always
//! - A panicking node task is reported as `unknown`, never propagated
//! - There are no retries here; classification comes from the client
//!
//! ## Last Modified
//! v0.1.0 - Initial cluster fan-out

pub mod query_log;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dnsfleet_client::{
    AddDomainRule, AddDomainRuleResponse, AuthStatus, BlockingParams, BlockingState,
    DomainRuleFilter, DomainRulesResponse, NodeApi, NodeConnectionConfig, NodeError,
    RemoveDomainRule,
};
use dnsfleet_common::{CommonError, NodeId, NodeIdentity};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};
use crate::services::cursor::CursorManager;

pub use query_log::{FetchQueryLogs, QueryLogPage, QueryParams};

// ============================================
// NodeResult
// ============================================

/// Outcome of one operation against one node.
///
/// Exactly one of `error` and `response` is present, and `success` says
/// which.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult<T> {
    node: NodeIdentity,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<NodeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<T>,
}

impl<T> NodeResult<T> {
    /// Successful outcome.
    pub fn ok(node: NodeIdentity, response: T) -> Self {
        Self {
            node,
            success: true,
            error: None,
            response: Some(response),
        }
    }

    /// Failed outcome.
    pub fn err(node: NodeIdentity, error: NodeError) -> Self {
        Self {
            node,
            success: false,
            error: Some(error),
            response: None,
        }
    }

    /// Wraps a client result.
    pub fn from_result(node: NodeIdentity, result: dnsfleet_client::Result<T>) -> Self {
        match result {
            Ok(response) => Self::ok(node, response),
            Err(error) => Self::err(node, error),
        }
    }

    /// Node this outcome belongs to.
    #[must_use]
    pub const fn node(&self) -> &NodeIdentity {
        &self.node
    }

    /// Returns `true` if the operation succeeded.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    /// Failure classification, if the operation failed.
    #[must_use]
    pub const fn error(&self) -> Option<&NodeError> {
        self.error.as_ref()
    }

    /// Upstream response, if the operation succeeded.
    #[must_use]
    pub const fn response(&self) -> Option<&T> {
        self.response.as_ref()
    }

    /// Converts back into a plain result.
    pub fn into_result(self) -> dnsfleet_client::Result<T> {
        match (self.response, self.error) {
            (Some(response), _) => Ok(response),
            (None, Some(error)) => Err(error),
            (None, None) => Err(NodeError::unknown("empty node result")),
        }
    }
}

/// Per-node outcomes of one fan-out, ordered by node id.
pub type FanOut<T> = BTreeMap<NodeId, NodeResult<T>>;

// ============================================
// Cluster
// ============================================

/// The set of managed nodes.
///
/// # Thread Safety
/// Membership changes take a short write lock; a fan-out copies the
/// membership first and runs against that copy, so concurrent changes only
/// affect later fan-outs.
pub struct Cluster {
    members: RwLock<BTreeMap<NodeId, Arc<dyn NodeApi>>>,
    call_timeout: Duration,
    cursors: Arc<CursorManager<QueryParams>>,
}

impl Cluster {
    /// Creates an empty cluster.
    ///
    /// `call_timeout` bounds every per-node task of every fan-out.
    #[must_use]
    pub fn new(call_timeout: Duration, cursors: Arc<CursorManager<QueryParams>>) -> Self {
        Self {
            members: RwLock::new(BTreeMap::new()),
            call_timeout,
            cursors,
        }
    }

    // ========================================
    // Membership
    // ========================================

    /// Adds a node.
    ///
    /// # Errors
    /// `NodeExists` if a node with the same id is already a member.
    pub fn add_client(&self, node: Arc<dyn NodeApi>) -> Result<()> {
        let id = node.identity().id;
        let mut members = self.members.write();
        if members.contains_key(&id) {
            return Err(ServerError::NodeExists(id));
        }
        members.insert(id, node);
        info!(node_id = %id, members = members.len(), "Node added to cluster");
        Ok(())
    }

    /// Replaces the connection settings of a member.
    ///
    /// # Errors
    /// `NodeNotFound` for an unknown id; `Common` if `config` names another id
    /// or fails validation.
    pub fn update_client(&self, id: NodeId, config: NodeConnectionConfig) -> Result<()> {
        if config.id != id {
            return Err(CommonError::invalid_input(
                "id",
                format!("config for node {} cannot update node {id}", config.id),
            )
            .into());
        }
        config.validate()?;

        let node = self
            .members
            .read()
            .get(&id)
            .cloned()
            .ok_or(ServerError::NodeNotFound(id))?;
        node.update_config(config);
        info!(node_id = %id, "Node connection updated");
        Ok(())
    }

    /// Removes a node, returning it if it was a member.
    pub fn remove_client(&self, id: NodeId) -> Option<Arc<dyn NodeApi>> {
        let removed = self.members.write().remove(&id);
        if removed.is_some() {
            info!(node_id = %id, "Node removed from cluster");
        }
        removed
    }

    /// Returns `true` if `id` is a member.
    #[must_use]
    pub fn has_client(&self, id: NodeId) -> bool {
        self.members.read().contains_key(&id)
    }

    /// Member ids in ascending order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.members.read().keys().copied().collect()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Returns `true` if the cluster has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Pagination cursor table.
    #[must_use]
    pub fn cursors(&self) -> &Arc<CursorManager<QueryParams>> {
        &self.cursors
    }

    /// Per-node call timeout.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn snapshot(&self) -> Vec<(NodeId, Arc<dyn NodeApi>)> {
        self.members
            .read()
            .iter()
            .map(|(id, node)| (*id, Arc::clone(node)))
            .collect()
    }

    // ========================================
    // Fan-out
    // ========================================

    /// Runs `op` against every current member concurrently.
    ///
    /// `op` is called once per node, on the caller's task, to build that
    /// node's future; the futures then run on their own tasks.
    ///
    /// Concurrency is one task per member with no cap, which limits this to
    /// small fleets.
    pub async fn fan_out<T, F, Fut>(&self, op: F) -> FanOut<T>
    where
        T: Send + 'static,
        F: Fn(NodeId, Arc<dyn NodeApi>) -> Fut,
        Fut: Future<Output = dnsfleet_client::Result<T>> + Send + 'static,
    {
        let members = self.snapshot();
        let timeout = self.call_timeout;

        let mut handles = Vec::with_capacity(members.len());
        for (id, node) in members {
            let identity = node.identity();
            let call = op(id, node);
            let handle = tokio::spawn(async move {
                tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
                    Err(NodeError::timeout(format!(
                        "no response within {}ms",
                        timeout.as_millis()
                    )))
                })
            });
            handles.push((id, identity, handle));
        }

        let mut results = BTreeMap::new();
        for (id, identity, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(node_id = %id, "Node task aborted: {}", e);
                    Err(NodeError::unknown("node task panicked"))
                }
            };
            if let Err(e) = &result {
                debug!(node_id = %id, kind = %e.kind, "Node call failed: {}", e.message);
            }
            results.insert(id, NodeResult::from_result(identity, result));
        }
        results
    }

    /// Lists domain rules on every node.
    pub async fn get_domain_rules(&self, filter: &DomainRuleFilter) -> FanOut<DomainRulesResponse> {
        let filter = filter.clone();
        self.fan_out(move |_, node| {
            let filter = filter.clone();
            async move { node.get_domain_rules(&filter).await }
        })
        .await
    }

    /// Adds domain rules on every node.
    pub async fn add_domain_rule(&self, rule: &AddDomainRule) -> FanOut<AddDomainRuleResponse> {
        let rule = rule.clone();
        self.fan_out(move |_, node| {
            let rule = rule.clone();
            async move { node.add_domain_rule(&rule).await }
        })
        .await
    }

    /// Removes a domain rule from every node.
    pub async fn remove_domain_rule(&self, rule: &RemoveDomainRule) -> FanOut<()> {
        let rule = rule.clone();
        self.fan_out(move |_, node| {
            let rule = rule.clone();
            async move { node.remove_domain_rule(&rule).await }
        })
        .await
    }

    /// Session status of every node.
    pub async fn auth_status(&self) -> FanOut<AuthStatus> {
        self.fan_out(|_, node| async move { node.auth_status().await })
            .await
    }

    /// Blocking status of every node.
    pub async fn blocking_status(&self) -> FanOut<BlockingState> {
        self.fan_out(|_, node| async move { node.blocking_status().await })
            .await
    }

    /// Enables or disables blocking on every node.
    pub async fn set_blocking(&self, params: &BlockingParams) -> FanOut<BlockingState> {
        let params = *params;
        self.fan_out(move |_, node| async move { node.set_blocking(&params).await })
            .await
    }

    /// Ends the session on every node.
    pub async fn logout(&self) -> FanOut<()> {
        self.fan_out(|_, node| async move { node.logout().await })
            .await
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("members", &self.node_ids())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
pub(crate) mod tests {
    use dnsfleet_client::mock::{MockCall, MockNode};
    use dnsfleet_client::{ErrorKind, RuleKind, RuleType};

    use super::*;

    pub(crate) fn cluster_of(nodes: &[Arc<MockNode>]) -> Cluster {
        let cluster = Cluster::new(
            Duration::from_secs(5),
            Arc::new(CursorManager::new(Duration::from_secs(300))),
        );
        for node in nodes {
            cluster.add_client(Arc::clone(node) as Arc<dyn NodeApi>).unwrap();
        }
        cluster
    }

    fn assert_envelope<T>(result: &NodeResult<T>) {
        assert_eq!(result.success(), result.error().is_none());
        assert_eq!(result.success(), result.response().is_some());
    }

    #[tokio::test]
    async fn test_one_entry_per_member_despite_failures() {
        let nodes: Vec<_> = (1..=4).map(|i| Arc::new(MockNode::new(i, format!("n{i}")))).collect();
        nodes[1].set_failure(Some(NodeError::transport("connection refused")));
        nodes[2].set_failure(Some(NodeError::from_status(401)));
        nodes[3].set_panic(true);
        let cluster = cluster_of(&nodes);

        let results = cluster.auth_status().await;

        assert_eq!(results.len(), 4);
        for result in results.values() {
            assert_envelope(result);
        }
        assert!(results[&NodeId::new(1)].success());
        assert_eq!(results[&NodeId::new(2)].error().unwrap().kind, ErrorKind::Transport);
        assert_eq!(results[&NodeId::new(3)].error().unwrap().kind, ErrorKind::Auth);
        assert_eq!(results[&NodeId::new(4)].error().unwrap().kind, ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_every_node_failing_still_yields_entries() {
        let nodes: Vec<_> = (1..=3).map(|i| Arc::new(MockNode::new(i, "x"))).collect();
        for node in &nodes {
            node.set_failure(Some(NodeError::from_status(503)));
        }
        let results = cluster_of(&nodes).blocking_status().await;
        assert_eq!(results.len(), 3);
        assert!(results.values().all(|r| !r.success() && r.error().unwrap().retryable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_node_times_out_without_blocking_others() {
        let fast = Arc::new(MockNode::new(1, "fast"));
        let slow = Arc::new(MockNode::new(2, "slow"));
        slow.set_delay(Some(Duration::from_secs(60)));
        let cluster = cluster_of(&[Arc::clone(&fast), Arc::clone(&slow)]);

        let started = tokio::time::Instant::now();
        let results = cluster.auth_status().await;

        assert!(started.elapsed() < Duration::from_secs(6));
        assert!(results[&NodeId::new(1)].success());
        let err = results[&NodeId::new(2)].error().unwrap();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_empty_cluster_fans_out_to_nothing() {
        let results = cluster_of(&[]).logout().await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_membership() {
        let a = Arc::new(MockNode::new(1, "a"));
        let cluster = cluster_of(&[Arc::clone(&a)]);

        let dup = cluster.add_client(Arc::new(MockNode::new(1, "again")) as Arc<dyn NodeApi>);
        assert!(matches!(dup, Err(ServerError::NodeExists(id)) if id == NodeId::new(1)));

        cluster.add_client(Arc::new(MockNode::new(2, "b")) as Arc<dyn NodeApi>).unwrap();
        assert_eq!(cluster.node_ids(), vec![NodeId::new(1), NodeId::new(2)]);
        assert!(cluster.has_client(NodeId::new(2)));

        assert!(cluster.remove_client(NodeId::new(2)).is_some());
        assert!(cluster.remove_client(NodeId::new(2)).is_none());
        assert_eq!(cluster.len(), 1);
    }

    #[tokio::test]
    async fn test_update_client() {
        let a = Arc::new(MockNode::new(1, "a"));
        let cluster = cluster_of(&[Arc::clone(&a)]);

        let config = NodeConnectionConfig::new(NodeId::new(1), "renamed", "10.0.0.9", "pw");
        cluster.update_client(NodeId::new(1), config.clone()).unwrap();
        assert_eq!(a.config_updates(), 1);
        assert_eq!(a.identity().name, "renamed");

        let missing = NodeConnectionConfig::new(NodeId::new(9), "x", "10.0.0.10", "pw");
        assert!(matches!(
            cluster.update_client(NodeId::new(9), missing),
            Err(ServerError::NodeNotFound(_))
        ));
        assert!(matches!(
            cluster.update_client(NodeId::new(2), config),
            Err(ServerError::Common(_))
        ));
    }

    #[tokio::test]
    async fn test_removed_node_not_in_next_fan_out() {
        let nodes: Vec<_> = (1..=2).map(|i| Arc::new(MockNode::new(i, "x"))).collect();
        let cluster = cluster_of(&nodes);
        cluster.remove_client(NodeId::new(1));

        let results = cluster.auth_status().await;
        assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![NodeId::new(2)]);
        assert!(nodes[0].calls().is_empty());
    }

    #[tokio::test]
    async fn test_domain_rule_fan_outs() {
        let nodes: Vec<_> = (1..=2).map(|i| Arc::new(MockNode::new(i, "x"))).collect();
        let cluster = cluster_of(&nodes);

        let added = cluster
            .add_domain_rule(&AddDomainRule::new(RuleType::Deny, RuleKind::Exact, ["ads.example"]))
            .await;
        assert!(added.values().all(NodeResult::success));

        let listed = cluster.get_domain_rules(&DomainRuleFilter::all()).await;
        for result in listed.values() {
            assert_eq!(result.response().unwrap().domains.len(), 1);
        }

        let remove = RemoveDomainRule::new(RuleType::Deny, RuleKind::Exact, "ads.example");
        assert!(cluster.remove_domain_rule(&remove).await.values().all(NodeResult::success));
        let again = cluster.remove_domain_rule(&remove).await;
        assert!(again.values().all(|r| r.error().unwrap().http_status == Some(404)));
    }

    #[tokio::test]
    async fn test_set_blocking_reaches_every_node() {
        let nodes: Vec<_> = (1..=3).map(|i| Arc::new(MockNode::new(i, "x"))).collect();
        let cluster = cluster_of(&nodes);
        let params = BlockingParams::disable(Some(Duration::from_secs(30)));

        let results = cluster.set_blocking(&params).await;
        assert_eq!(results.len(), 3);
        for node in &nodes {
            assert_eq!(node.calls(), vec![MockCall::SetBlocking(params)]);
        }
    }

    #[test]
    fn test_node_result_serialization() {
        let identity = NodeIdentity::new(1, "den", "10.0.0.2");
        let ok = serde_json::to_value(NodeResult::ok(identity.clone(), 5u8)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["response"], 5);
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(NodeResult::<u8>::err(identity, NodeError::timeout("slow"))).unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["error"]["kind"], "timeout");
        assert!(err.get("response").is_none());
    }

    #[test]
    fn test_into_result() {
        let identity = NodeIdentity::new(1, "den", "10.0.0.2");
        assert_eq!(NodeResult::ok(identity.clone(), 3u8).into_result().unwrap(), 3);
        assert!(NodeResult::<u8>::err(identity, NodeError::decode("bad")).into_result().is_err());
    }
}
