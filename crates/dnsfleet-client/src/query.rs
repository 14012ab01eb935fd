// ============================================
// File: crates/dnsfleet-client/src/query.rs
// ============================================
//! # Query Log Requests
//!
//! ## Creation Reason
//! The query log endpoint takes its filters and paging controls as query
//! string parameters. Keeping filters separate from paging lets the cluster
//! store the filters of a search once and replay them on every page.
//!
//! ## Main Functionality
//! - `QueryLogFilters`: What to search for (time range, domain, client, ...)
//! - `QueryLogRequest`: Filters plus `cursor`, `length` and `start`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `cursor` is the NODE's own cursor, never a dnsfleet `CursorId`
//! - A continuation sends `cursor` and no `start`
//!
//! ## Last Modified
//! v0.1.0 - Initial query log request model

use serde::{Deserialize, Serialize};

// ============================================
// QueryLogFilters
// ============================================

/// Filters applied to a query log search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLogFilters {
    /// Only queries at or after this Unix time (seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    /// Only queries before this Unix time (seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    /// Queried domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    /// Client host name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Upstream resolver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// Query type, e.g. `A` or `AAAA`
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    /// Query status, e.g. `GRAVITY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Reply type, e.g. `NXDOMAIN`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    /// DNSSEC status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnssec: Option<String>,
    /// Read from the on-disk database instead of memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<bool>,
}

impl QueryLogFilters {
    /// Returns `true` if no filter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn append_pairs(&self, out: &mut Vec<(&'static str, String)>) {
        let text = [
            ("domain", &self.domain),
            ("client_ip", &self.client_ip),
            ("client_name", &self.client_name),
            ("upstream", &self.upstream),
            ("type", &self.query_type),
            ("status", &self.status),
            ("reply", &self.reply),
            ("dnssec", &self.dnssec),
        ];
        if let Some(from) = self.from {
            out.push(("from", from.to_string()));
        }
        if let Some(until) = self.until {
            out.push(("until", until.to_string()));
        }
        for (key, value) in text {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                out.push((key, value.to_string()));
            }
        }
        if let Some(disk) = self.disk {
            out.push(("disk", disk.to_string()));
        }
    }
}

// ============================================
// QueryLogRequest
// ============================================

/// One call to a node's query log endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryLogRequest {
    /// Search filters
    pub filters: QueryLogFilters,
    /// Node cursor to continue from
    pub cursor: Option<i64>,
    /// Page size
    pub length: Option<u32>,
    /// Offset of the first record, fresh searches only
    pub start: Option<u32>,
}

impl QueryLogRequest {
    /// A first-page request.
    #[must_use]
    pub fn fresh(filters: QueryLogFilters, length: Option<u32>, start: Option<u32>) -> Self {
        Self {
            filters,
            cursor: None,
            length,
            start,
        }
    }

    /// A follow-up request continuing from `cursor`.
    #[must_use]
    pub fn continuation(filters: QueryLogFilters, cursor: i64, length: Option<u32>) -> Self {
        Self {
            filters,
            cursor: Some(cursor),
            length,
            start: None,
        }
    }

    /// Query string pairs in the form the node expects.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(cursor) = self.cursor {
            pairs.push(("cursor", cursor.to_string()));
        }
        if let Some(length) = self.length {
            pairs.push(("length", length.to_string()));
        }
        if let Some(start) = self.start {
            pairs.push(("start", start.to_string()));
        }
        self.filters.append_pairs(&mut pairs);
        pairs
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(pairs: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_fresh_request_pairs() {
        let filters = QueryLogFilters {
            domain: Some("ads.example".into()),
            from: Some(1_700_000_000),
            disk: Some(true),
            client_ip: Some(String::new()),
            ..QueryLogFilters::default()
        };
        let pairs = QueryLogRequest::fresh(filters, Some(50), Some(10)).query_pairs();
        assert_eq!(get(&pairs, "length"), Some("50"));
        assert_eq!(get(&pairs, "start"), Some("10"));
        assert_eq!(get(&pairs, "domain"), Some("ads.example"));
        assert_eq!(get(&pairs, "from"), Some("1700000000"));
        assert_eq!(get(&pairs, "disk"), Some("true"));
        assert_eq!(get(&pairs, "cursor"), None);
        // Empty strings are not sent
        assert_eq!(get(&pairs, "client_ip"), None);
    }

    #[test]
    fn test_continuation_never_sends_start() {
        let pairs = QueryLogRequest::continuation(QueryLogFilters::default(), 8123, Some(25)).query_pairs();
        assert_eq!(get(&pairs, "cursor"), Some("8123"));
        assert_eq!(get(&pairs, "length"), Some("25"));
        assert_eq!(get(&pairs, "start"), None);
    }

    #[test]
    fn test_filters_json_uses_type_key() {
        let filters: QueryLogFilters =
            serde_json::from_str(r#"{"type": "AAAA", "status": "GRAVITY"}"#).unwrap();
        assert_eq!(filters.query_type.as_deref(), Some("AAAA"));
        assert!(!filters.is_empty());
        assert!(QueryLogFilters::default().is_empty());
    }
}
