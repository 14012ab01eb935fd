// ============================================
// File: crates/dnsfleet-client/src/models.rs
// ============================================
//! # Node API Models
//!
//! ## Creation Reason
//! Data structures exchanged with upstream nodes, plus the few normalized
//! views (`AuthStatus`, `BlockingState`) the cluster hands to its callers.
//!
//! ## Main Functionality
//! - Auth: `LoginRequest`, `AuthResponse`, `SessionInfo`, `AuthStatus`
//! - Query log: `QueryLogResponse`, `DnsLogEntry` and its parts
//! - Domains: `DomainRule`, `DomainRulesResponse`, `AddDomainRuleResponse`
//! - Blocking: `BlockingStatus`, `BlockingState`, `BlockingParams`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Node fields are snake_case or camelCase depending on endpoint;
//!   keep the `serde` renames in sync with the node API
//! - Unknown fields are ignored so newer node versions keep working
//! - `took` is reported by nodes in seconds; the `took_ms` fields here
//!   are already converted
//!
//! ## Last Modified
//! v0.1.0 - Initial models

use std::fmt;
use std::time::Duration;

use dnsfleet_common::Timestamp;
use serde::{Deserialize, Serialize};

use crate::rule::{RuleKind, RuleType};

/// Converts a node `took` value (seconds) into milliseconds.
#[must_use]
pub fn took_to_millis(took_secs: f64) -> f64 {
    took_secs * 1000.0
}

// ============================================
// Auth
// ============================================

/// Body of `POST /api/auth`.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub password: &'a str,
}

/// Response of `POST /api/auth` and `GET /api/auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// Session details
    pub session: SessionInfo,
    /// Processing time in seconds
    #[serde(default)]
    pub took: f64,
}

/// Session part of an auth response.
#[derive(Clone, Deserialize)]
pub struct SessionInfo {
    /// Whether the session is valid
    pub valid: bool,
    /// Session id, absent when invalid
    #[serde(default)]
    pub sid: Option<String>,
    /// CSRF token, unused by dnsfleet
    #[serde(default)]
    pub csrf: Option<String>,
    /// Remaining validity in seconds
    #[serde(default)]
    pub validity: i64,
}

impl fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInfo")
            .field("valid", &self.valid)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

/// Normalized result of an auth status check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    /// Whether the node considers our session valid
    pub valid: bool,
    /// Remaining validity in seconds
    pub validity_seconds: i64,
    /// Absolute expiry, computed when the answer arrived
    pub valid_until: Timestamp,
    /// Node processing time in milliseconds
    pub took_ms: f64,
}

impl AuthStatus {
    /// Builds a status from a node answer received now.
    #[must_use]
    pub fn from_response(response: &AuthResponse) -> Self {
        let validity = response.session.validity.max(0);
        let valid_until =
            Timestamp::now().saturating_add(Duration::from_secs(validity.unsigned_abs()));
        Self {
            valid: response.session.valid,
            validity_seconds: validity,
            valid_until,
            took_ms: took_to_millis(response.took),
        }
    }
}

// ============================================
// Query Log
// ============================================

/// Response of `GET /api/queries`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogResponse {
    /// Matching queries, newest first
    #[serde(default)]
    pub queries: Vec<DnsLogEntry>,
    /// Node cursor for the next page
    #[serde(default)]
    pub cursor: Option<i64>,
    /// Total number of queries on the node
    #[serde(default)]
    pub records_total: i64,
    /// Number of queries matching the filters
    #[serde(default)]
    pub records_filtered: i64,
    /// Echo of the request draw counter
    #[serde(default)]
    pub draw: i64,
    /// Processing time in seconds
    #[serde(default)]
    pub took: f64,
}

/// One logged DNS query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsLogEntry {
    /// Node-local query id
    pub id: i64,
    /// Unix time with fractional seconds
    pub time: f64,
    /// Query type, e.g. `A`
    #[serde(rename = "type", default)]
    pub query_type: String,
    /// Query status, e.g. `FORWARDED`
    #[serde(default)]
    pub status: Option<String>,
    /// DNSSEC status
    #[serde(default)]
    pub dnssec: Option<String>,
    /// Queried domain
    #[serde(default)]
    pub domain: String,
    /// Upstream resolver that answered
    #[serde(default)]
    pub upstream: Option<String>,
    /// Reply details
    #[serde(default)]
    pub reply: ReplyInfo,
    /// Requesting client
    #[serde(default)]
    pub client: ClientInfo,
    /// Id of the list that matched
    #[serde(default)]
    pub list_id: Option<i64>,
    /// Extended DNS error
    #[serde(default)]
    pub ede: EdeInfo,
    /// CNAME target that caused blocking
    #[serde(default)]
    pub cname: Option<String>,
}

/// Reply part of a query log entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyInfo {
    /// Reply type, e.g. `IP` or `NXDOMAIN`
    #[serde(rename = "type", default)]
    pub reply_type: Option<String>,
    /// Reply time in seconds
    #[serde(default)]
    pub time: f64,
}

/// Client part of a query log entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client address
    #[serde(default)]
    pub ip: String,
    /// Client host name, if known
    #[serde(default)]
    pub name: Option<String>,
}

/// Extended DNS error of a query log entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdeInfo {
    /// EDE code, `-1` when absent
    #[serde(default)]
    pub code: i64,
    /// EDE text
    #[serde(default)]
    pub text: Option<String>,
}

// ============================================
// Domains
// ============================================

/// One allow/deny rule stored on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRule {
    /// Domain or pattern
    pub domain: String,
    /// Unicode form of the domain
    #[serde(default)]
    pub unicode: Option<String>,
    /// Allow or deny
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Exact or regex
    pub kind: RuleKind,
    /// Free-form comment
    #[serde(default)]
    pub comment: Option<String>,
    /// Group ids the rule applies to
    #[serde(default)]
    pub groups: Vec<i64>,
    /// Whether the rule is active
    #[serde(default)]
    pub enabled: bool,
    /// Node-local rule id
    #[serde(default)]
    pub id: i64,
    /// Creation time, Unix seconds
    #[serde(default)]
    pub date_added: i64,
    /// Last modification time, Unix seconds
    #[serde(default)]
    pub date_modified: i64,
}

/// Response of `GET /api/domains/...`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainRulesResponse {
    /// Matching rules
    #[serde(default)]
    pub domains: Vec<DomainRule>,
    /// Processing time in seconds
    #[serde(default)]
    pub took: f64,
}

/// Response of `POST /api/domains/{type}/{kind}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddDomainRuleResponse {
    /// Rules as stored after the call
    #[serde(default)]
    pub domains: Vec<DomainRule>,
    /// Per-item outcome
    #[serde(default)]
    pub processed: Processed,
    /// Processing time in seconds
    #[serde(default)]
    pub took: f64,
}

/// Per-item outcome of a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processed {
    /// Items written
    #[serde(default)]
    pub success: Vec<ProcessedItem>,
    /// Items rejected
    #[serde(default)]
    pub errors: Vec<ProcessedError>,
}

/// An item written successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedItem {
    /// The domain or pattern
    pub item: String,
}

/// An item the node rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedError {
    /// The domain or pattern
    pub item: String,
    /// Why it was rejected
    pub error: String,
}

// ============================================
// Blocking
// ============================================

/// Blocking state reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingStatus {
    /// Filtering is active.
    Enabled,
    /// Filtering is paused.
    Disabled,
    /// The node failed to apply its blocking state.
    Failed,
    /// Anything else.
    #[serde(other)]
    Unknown,
}

/// Body of `GET`/`POST /api/dns/blocking` as sent by the node.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BlockingWire {
    pub blocking: BlockingStatus,
    #[serde(default)]
    pub timer: Option<f64>,
    #[serde(default)]
    pub took: f64,
}

/// Normalized blocking state of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingState {
    /// Current state
    pub status: BlockingStatus,
    /// Seconds until the state flips back, if a timer is running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_secs: Option<f64>,
    /// Node processing time in milliseconds
    pub took_ms: f64,
}

impl BlockingWire {
    pub(crate) fn into_state(self) -> BlockingState {
        BlockingState {
            status: self.blocking,
            timer_secs: self.timer.filter(|t| *t > 0.0),
            took_ms: took_to_millis(self.took),
        }
    }
}

/// Requested blocking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingParams {
    /// `true` to enable filtering
    pub blocking: bool,
    /// Revert after this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<u64>,
}

impl BlockingParams {
    /// Enables filtering indefinitely.
    #[must_use]
    pub const fn enable() -> Self {
        Self {
            blocking: true,
            timer: None,
        }
    }

    /// Disables filtering, optionally for `timer` only.
    #[must_use]
    pub fn disable(timer: Option<Duration>) -> Self {
        Self {
            blocking: false,
            timer: timer.map(|d| d.as_secs()),
        }
    }
}

// ============================================
// Tests
// ============================================
