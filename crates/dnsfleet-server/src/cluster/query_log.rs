// ============================================
// File: crates/dnsfleet-server/src/cluster/query_log.rs
// ============================================
//! # Query Log Pagination
//!
//! ## Creation Reason
//! Each node keeps its own query log cursor. A cluster-wide search pages
//! through all of them at once behind one opaque cursor id.
//!
//! ## Main Functionality
//! - First call: fan out the search, remember each node's returned offset
//! - Follow-up: replay the remembered filters from each node's offset
//! - No offset moved: report end of results under the same cursor id
//!
//! ## ⚠️ Important Note for Next Developer
//! - Filters sent with a cursor are ignored; only `length` may change
//! - A failing node keeps its previous offset so it resumes where it was
//! - Progress always mints a new cursor; the old one simply ages out
//!
//! ## Last Modified
//! v0.1.0 - Initial pagination

use std::collections::BTreeMap;
use std::sync::Arc;

use dnsfleet_client::{QueryLogFilters, QueryLogRequest, QueryLogResponse};
use dnsfleet_common::{CursorId, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Cluster, FanOut};
use crate::error::{Result, ServerError};

/// Parameters remembered for the lifetime of a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// Search filters
    pub filters: QueryLogFilters,
    /// Page size
    pub length: Option<u32>,
    /// Offset of the first record of a fresh search
    pub start: Option<u32>,
}

/// A cluster-wide query log request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchQueryLogs {
    /// Cursor of a previous page; `None` starts a new search
    pub cursor: Option<CursorId>,
    /// Search filters, used only when `cursor` is `None`
    #[serde(flatten)]
    pub filters: QueryLogFilters,
    /// Page size
    pub length: Option<u32>,
    /// Offset of the first record, used only when `cursor` is `None`
    pub start: Option<u32>,
}

impl FetchQueryLogs {
    /// A new search.
    #[must_use]
    pub fn search(filters: QueryLogFilters, length: Option<u32>) -> Self {
        Self {
            filters,
            length,
            ..Self::default()
        }
    }

    /// The page after the one `cursor` was returned with.
    #[must_use]
    pub fn next_page(cursor: CursorId) -> Self {
        Self {
            cursor: Some(cursor),
            ..Self::default()
        }
    }
}

/// One page of a cluster-wide search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogPage {
    /// Cursor for the next page
    pub cursor: CursorId,
    /// Per-node results of this page
    pub results: FanOut<QueryLogResponse>,
    /// `true` once no node made progress
    pub end_of_results: bool,
}

impl Cluster {
    /// Fetches one page of query logs from every node.
    ///
    /// # Errors
    /// `CursorNotFound` if `request.cursor` is unknown or expired. Per-node
    /// failures are reported inside the page.
    pub async fn fetch_query_logs(&self, request: &FetchQueryLogs) -> Result<QueryLogPage> {
        match request.cursor {
            None => Ok(self.first_page(request).await),
            Some(cursor) => self.next_page(cursor, request.length).await,
        }
    }

    async fn first_page(&self, request: &FetchQueryLogs) -> QueryLogPage {
        let params = QueryParams {
            filters: request.filters.clone(),
            length: request.length,
            start: request.start,
        };
        let upstream = QueryLogRequest::fresh(params.filters.clone(), params.length, params.start);

        let results = self
            .fan_out(move |_, node| {
                let upstream = upstream.clone();
                async move { node.fetch_query_logs(&upstream).await }
            })
            .await;

        let mut offsets = BTreeMap::new();
        advance_offsets(&mut offsets, &results);
        let cursor = self.cursors.create(params, offsets);
        debug!(cursor = %cursor, nodes = results.len(), "Query log search started");

        QueryLogPage {
            cursor,
            results,
            end_of_results: false,
        }
    }

    async fn next_page(&self, cursor: CursorId, length: Option<u32>) -> Result<QueryLogPage> {
        let state = self
            .cursors
            .get(&cursor)
            .ok_or(ServerError::CursorNotFound(cursor))?;

        let length = length.or(state.params.length);
        let params = Arc::new(state.params.clone());
        let previous = Arc::new(state.offsets.clone());

        let results = {
            let params = Arc::clone(&params);
            let previous = Arc::clone(&previous);
            self.fan_out(move |id, node| {
                let upstream = match previous.get(&id) {
                    Some(offset) => QueryLogRequest::continuation(params.filters.clone(), *offset, length),
                    None => QueryLogRequest::fresh(params.filters.clone(), length, params.start),
                };
                async move { node.fetch_query_logs(&upstream).await }
            })
            .await
        };

        let mut offsets = state.offsets;
        advance_offsets(&mut offsets, &results);

        if offsets == *previous {
            debug!(cursor = %cursor, "Query log search exhausted");
            return Ok(QueryLogPage {
                cursor,
                results,
                end_of_results: true,
            });
        }

        let next = self.cursors.create(state.params, offsets);
        debug!(cursor = %cursor, next = %next, "Query log search advanced");
        Ok(QueryLogPage {
            cursor: next,
            results,
            end_of_results: false,
        })
    }
}

/// Records the offset of every node that answered with one.
fn advance_offsets(offsets: &mut BTreeMap<NodeId, i64>, results: &FanOut<QueryLogResponse>) {
    for (id, result) in results {
        if let Some(offset) = result.response().and_then(|r| r.cursor) {
            offsets.insert(*id, offset);
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dnsfleet_client::mock::MockNode;
    use dnsfleet_client::NodeError;

    use super::*;
    use crate::cluster::tests::cluster_of;

    /// Node that hands out `first` on a fresh search, then moves `step` per page
    /// until it reaches `last`.
    fn paging_node(id: i64, first: i64, step: i64, last: i64) -> Arc<MockNode> {
        let node = Arc::new(MockNode::new(id, format!("n{id}")));
        node.set_query_handler(move |request| {
            let cursor = request.cursor.map_or(first, |c| (c + step).min(last));
            Ok(QueryLogResponse {
                cursor: Some(cursor),
                ..QueryLogResponse::default()
            })
        });
        node
    }

    fn filters() -> QueryLogFilters {
        QueryLogFilters {
            domain: Some("ads.example".into()),
            ..QueryLogFilters::default()
        }
    }

    #[tokio::test]
    async fn test_first_page_records_offsets() {
        let n1 = paging_node(1, 10, 10, 100);
        let n2 = paging_node(2, 7, 7, 100);
        let cluster = cluster_of(&[Arc::clone(&n1), Arc::clone(&n2)]);

        let page = cluster
            .fetch_query_logs(&FetchQueryLogs::search(filters(), Some(10)))
            .await
            .unwrap();

        assert!(!page.end_of_results);
        assert_eq!(page.results.len(), 2);
        let state = cluster.cursors().get(&page.cursor).unwrap();
        assert_eq!(
            state.offsets,
            BTreeMap::from([(NodeId::new(1), 10), (NodeId::new(2), 7)])
        );
        assert_eq!(n1.query_requests()[0], QueryLogRequest::fresh(filters(), Some(10), None));
    }

    #[tokio::test]
    async fn test_next_page_replays_original_filters() {
        let n1 = paging_node(1, 10, 10, 100);
        let n2 = paging_node(2, 7, 7, 100);
        let cluster = cluster_of(&[Arc::clone(&n1), Arc::clone(&n2)]);

        let first = cluster
            .fetch_query_logs(&FetchQueryLogs::search(filters(), Some(10)))
            .await
            .unwrap();

        let mut follow_up = FetchQueryLogs::next_page(first.cursor);
        follow_up.filters.domain = Some("ignored.example".into());
        let second = cluster.fetch_query_logs(&follow_up).await.unwrap();

        assert!(!second.end_of_results);
        assert_ne!(second.cursor, first.cursor);
        assert_eq!(n1.query_requests()[1], QueryLogRequest::continuation(filters(), 10, Some(10)));
        assert_eq!(n2.query_requests()[1], QueryLogRequest::continuation(filters(), 7, Some(10)));
        assert!(n1.query_requests()[1].start.is_none());

        let state = cluster.cursors().get(&second.cursor).unwrap();
        assert_eq!(state.params.filters, filters());
        assert_eq!(
            state.offsets,
            BTreeMap::from([(NodeId::new(1), 20), (NodeId::new(2), 14)])
        );
    }

    #[tokio::test]
    async fn test_length_override() {
        let n1 = paging_node(1, 10, 10, 100);
        let cluster = cluster_of(&[Arc::clone(&n1)]);
        let first = cluster
            .fetch_query_logs(&FetchQueryLogs::search(filters(), Some(10)))
            .await
            .unwrap();

        let mut follow_up = FetchQueryLogs::next_page(first.cursor);
        follow_up.length = Some(50);
        cluster.fetch_query_logs(&follow_up).await.unwrap();
        assert_eq!(n1.query_requests()[1].length, Some(50));
    }

    #[tokio::test]
    async fn test_exhausted_search_reuses_cursor() {
        let n1 = paging_node(1, 10, 10, 10);
        let cluster = cluster_of(&[n1]);
        let first = cluster
            .fetch_query_logs(&FetchQueryLogs::search(filters(), None))
            .await
            .unwrap();
        assert_eq!(cluster.cursors().len(), 1);

        let tail = cluster
            .fetch_query_logs(&FetchQueryLogs::next_page(first.cursor))
            .await
            .unwrap();
        assert!(tail.end_of_results);
        assert_eq!(tail.cursor, first.cursor);
        assert_eq!(cluster.cursors().len(), 1);

        let again = cluster
            .fetch_query_logs(&FetchQueryLogs::next_page(tail.cursor))
            .await
            .unwrap();
        assert!(again.end_of_results);
        assert_eq!(cluster.cursors().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_node_keeps_offset() {
        let n1 = paging_node(1, 10, 10, 100);
        let n2 = paging_node(2, 7, 7, 100);
        let cluster = cluster_of(&[Arc::clone(&n1), Arc::clone(&n2)]);
        let first = cluster
            .fetch_query_logs(&FetchQueryLogs::search(filters(), Some(10)))
            .await
            .unwrap();

        n2.set_failure(Some(NodeError::transport("connection reset")));
        let second = cluster
            .fetch_query_logs(&FetchQueryLogs::next_page(first.cursor))
            .await
            .unwrap();
        assert!(!second.results[&NodeId::new(2)].success());

        let state = cluster.cursors().get(&second.cursor).unwrap();
        assert_eq!(
            state.offsets,
            BTreeMap::from([(NodeId::new(1), 20), (NodeId::new(2), 7)])
        );

        n2.set_failure(None);
        cluster
            .fetch_query_logs(&FetchQueryLogs::next_page(second.cursor))
            .await
            .unwrap();
        assert_eq!(n2.query_requests().last().unwrap().cursor, Some(7));
    }

    #[tokio::test]
    async fn test_node_without_offset_starts_fresh() {
        let n1 = paging_node(1, 10, 10, 100);
        let n2 = paging_node(2, 7, 7, 100);
        n2.set_failure(Some(NodeError::timeout("slow")));
        let cluster = cluster_of(&[Arc::clone(&n1), Arc::clone(&n2)]);

        let mut search = FetchQueryLogs::search(filters(), Some(10));
        search.start = Some(30);
        let first = cluster.fetch_query_logs(&search).await.unwrap();

        n2.set_failure(None);
        cluster
            .fetch_query_logs(&FetchQueryLogs::next_page(first.cursor))
            .await
            .unwrap();
        let retried = n2.query_requests().last().cloned().unwrap();
        assert_eq!(retried, QueryLogRequest::fresh(filters(), Some(10), Some(30)));
    }

    #[tokio::test]
    async fn test_unknown_cursor_fails_whole_call() {
        let cluster = cluster_of(&[paging_node(1, 10, 10, 100)]);
        let err = cluster
            .fetch_query_logs(&FetchQueryLogs::next_page(CursorId::generate()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::CursorNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cursor() {
        let cluster = cluster_of(&[paging_node(1, 10, 10, 100)]);
        let first = cluster
            .fetch_query_logs(&FetchQueryLogs::search(filters(), None))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        let err = cluster
            .fetch_query_logs(&FetchQueryLogs::next_page(first.cursor))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::CursorNotFound(id) if id == first.cursor));
        assert!(cluster.cursors().is_empty());
    }

    #[test]
    fn test_request_deserialization() {
        let request: FetchQueryLogs =
            serde_json::from_str(r#"{"domain":"ads.example","length":25}"#).unwrap();
        assert_eq!(request.filters.domain.as_deref(), Some("ads.example"));
        assert_eq!(request.length, Some(25));
        assert!(request.cursor.is_none());
    }
}
