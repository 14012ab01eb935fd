// ============================================
// File: crates/dnsfleet-server/src/services/blocking.rs
// ============================================
//! # Cluster Blocking Summary
//!
//! Folds the per-node blocking states of one fan-out into a fleet view:
//! whether every node agrees, how many are in each state, and the spread
//! of disable timers and response times.
//!
//! ## Last Modified
//! v0.1.0 - Initial blocking summary

use dnsfleet_client::{BlockingState, BlockingStatus};
use serde::Serialize;

use crate::cluster::FanOut;

/// Fleet-wide blocking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingMode {
    /// Every node is blocking
    Enabled,
    /// Every node has blocking disabled
    Disabled,
    /// Nodes disagree
    Mixed,
    /// At least one node failed to answer or reported a failure
    Degraded,
}

/// Counters over one blocking fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingSummary {
    /// Fleet-wide mode
    pub mode: BlockingMode,
    /// Every node reported the same state
    pub unanimous: bool,
    /// Nodes in the fan-out
    pub total: usize,
    /// Nodes blocking
    pub enabled: usize,
    /// Nodes not blocking
    pub disabled: usize,
    /// Nodes reporting a blocking failure or an unknown state
    pub failed: usize,
    /// Nodes that could not be queried
    pub errors: usize,
    /// Shortest remaining disable timer
    pub min_timer_secs: Option<f64>,
    /// Longest remaining disable timer
    pub max_timer_secs: Option<f64>,
    /// Slowest node response
    pub max_took_ms: f64,
    /// Average over the nodes that answered
    pub avg_took_ms: f64,
}

impl BlockingSummary {
    /// Summarizes a blocking fan-out.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_results(results: &FanOut<BlockingState>) -> Self {
        let mut summary = Self {
            mode: BlockingMode::Degraded,
            unanimous: false,
            total: results.len(),
            enabled: 0,
            disabled: 0,
            failed: 0,
            errors: 0,
            min_timer_secs: None,
            max_timer_secs: None,
            max_took_ms: 0.0,
            avg_took_ms: 0.0,
        };

        let mut took_total = 0.0;
        let mut answered = 0usize;
        for result in results.values() {
            let Some(state) = result.response() else {
                summary.errors += 1;
                continue;
            };
            answered += 1;
            match state.status {
                BlockingStatus::Enabled => summary.enabled += 1,
                BlockingStatus::Disabled => summary.disabled += 1,
                BlockingStatus::Failed | BlockingStatus::Unknown => summary.failed += 1,
            }
            if let Some(timer) = state.timer_secs {
                summary.min_timer_secs = Some(summary.min_timer_secs.map_or(timer, |m| m.min(timer)));
                summary.max_timer_secs = Some(summary.max_timer_secs.map_or(timer, |m| m.max(timer)));
            }
            summary.max_took_ms = summary.max_took_ms.max(state.took_ms);
            took_total += state.took_ms;
        }
        if answered > 0 {
            summary.avg_took_ms = took_total / answered as f64;
        }

        // An empty cluster stays degraded
        if summary.total > 0 && summary.errors == 0 && summary.failed == 0 {
            summary.mode = if summary.enabled == summary.total {
                BlockingMode::Enabled
            } else if summary.disabled == summary.total {
                BlockingMode::Disabled
            } else {
                BlockingMode::Mixed
            };
            summary.unanimous = summary.mode != BlockingMode::Mixed;
        }
        summary
    }
}

/// Blocking state of the whole cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterBlocking {
    /// Fleet counters
    pub summary: BlockingSummary,
    /// Per-node results
    pub nodes: FanOut<BlockingState>,
}

impl From<FanOut<BlockingState>> for ClusterBlocking {
    fn from(nodes: FanOut<BlockingState>) -> Self {
        Self {
            summary: BlockingSummary::from_results(&nodes),
            nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use dnsfleet_client::NodeError;
    use dnsfleet_common::{NodeId, NodeIdentity};

    use super::*;
    use crate::cluster::NodeResult;

    fn state(status: BlockingStatus, timer: Option<f64>, took_ms: f64) -> BlockingState {
        BlockingState {
            status,
            timer_secs: timer,
            took_ms,
        }
    }

    fn fan_out(entries: Vec<Result<BlockingState, NodeError>>) -> FanOut<BlockingState> {
        entries
            .into_iter()
            .zip(1..)
            .map(|(entry, id)| {
                let node = NodeIdentity::new(id, format!("n{id}"), format!("10.0.0.{id}"));
                (NodeId::new(id), NodeResult::from_result(node, entry))
            })
            .collect()
    }

    #[test]
    fn test_unanimous_enabled() {
        let summary = BlockingSummary::from_results(&fan_out(vec![
            Ok(state(BlockingStatus::Enabled, None, 1.0)),
            Ok(state(BlockingStatus::Enabled, None, 3.0)),
        ]));
        assert_eq!(summary.mode, BlockingMode::Enabled);
        assert!(summary.unanimous);
        assert_eq!(summary.enabled, 2);
        assert!((summary.max_took_ms - 3.0).abs() < f64::EPSILON);
        assert!((summary.avg_took_ms - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mixed_with_timers() {
        let summary = BlockingSummary::from_results(&fan_out(vec![
            Ok(state(BlockingStatus::Enabled, None, 1.0)),
            Ok(state(BlockingStatus::Disabled, Some(30.0), 1.0)),
            Ok(state(BlockingStatus::Disabled, Some(12.5), 1.0)),
        ]));
        assert_eq!(summary.mode, BlockingMode::Mixed);
        assert!(!summary.unanimous);
        assert_eq!(summary.min_timer_secs, Some(12.5));
        assert_eq!(summary.max_timer_secs, Some(30.0));
    }

    #[test]
    fn test_error_degrades() {
        let summary = BlockingSummary::from_results(&fan_out(vec![
            Ok(state(BlockingStatus::Disabled, None, 1.0)),
            Err(NodeError::timeout("slow")),
        ]));
        assert_eq!(summary.mode, BlockingMode::Degraded);
        assert_eq!((summary.errors, summary.disabled, summary.total), (1, 1, 2));
        assert!((summary.avg_took_ms - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_state_degrades() {
        let summary =
            BlockingSummary::from_results(&fan_out(vec![Ok(state(BlockingStatus::Failed, None, 1.0))]));
        assert_eq!(summary.mode, BlockingMode::Degraded);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_empty_cluster() {
        let blocking = ClusterBlocking::from(FanOut::new());
        assert_eq!(blocking.summary.mode, BlockingMode::Degraded);
        assert_eq!(blocking.summary.total, 0);
    }
}
