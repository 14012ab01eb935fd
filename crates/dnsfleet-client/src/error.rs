// ============================================
// File: crates/dnsfleet-client/src/error.rs
// ============================================
//! # Node Error Types
//!
//! ## Creation Reason
//! Every call to an upstream node can fail in many ways (timeouts, refused
//! connections, unexpected status codes, malformed JSON). Callers of the
//! cluster only need to know which *class* of failure happened, so
//! classification is done exactly once, here, at the client boundary.
//!
//! ## Main Functionality
//! - `ErrorKind`: Failure taxonomy (timeout, transport, protocol, auth, decode, unknown)
//! - `NodeError`: Classified, cloneable, serializable error returned by `NodeApi`
//! - `ClientError`: Raw failure inside `NodeClient`, converted into `NodeError`
//!
//! ## Error Categories
//! 1. **Timeout**: The per-call deadline elapsed (retryable)
//! 2. **Transport**: Connection refused/reset, DNS failure (retryable)
//! 3. **Protocol**: Unexpected HTTP status; 5xx is retryable
//! 4. **Auth**: 401/403 or a login the upstream declared invalid
//! 5. **Decode**: Response body is not the expected JSON
//! 6. **Unknown**: Anything else
//!
//! ## ⚠️ Important Note for Next Developer
//! - `retryable` is a hint for callers; nothing in dnsfleet retries on its own
//! - Never put the node password or session id into an error message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Upper bound on how much of an upstream error body is kept.
const MAX_ERROR_BODY: usize = 256;

// ============================================
// ErrorKind
// ============================================

/// Classification of a node failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The call did not complete within its deadline.
    Timeout,
    /// Network-level failure.
    Transport,
    /// The node answered with an unexpected status.
    Protocol,
    /// The node rejected our credentials or session.
    Auth,
    /// The node answered with a body we could not parse.
    Decode,
    /// Unclassified failure.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Auth => "auth",
            Self::Decode => "decode",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ============================================
// NodeError
// ============================================

/// Classified failure of one node call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct NodeError {
    /// Failure class
    pub kind: ErrorKind,
    /// Human readable description
    pub message: String,
    /// HTTP status, when the node answered at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Whether retrying later may succeed
    pub retryable: bool,
}

impl NodeError {
    fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
            retryable,
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message, true)
    }

    /// Creates a `Transport` error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message, true)
    }

    /// Creates a `Decode` error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message, false)
    }

    /// Creates an `Unknown` error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message, false)
    }

    /// Classifies an HTTP status the node answered with.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        let (kind, message, retryable) = match status {
            401 | 403 => (ErrorKind::Auth, "authentication failed".to_string(), false),
            500..=599 => (ErrorKind::Protocol, format!("node returned HTTP {status}"), true),
            _ => (ErrorKind::Protocol, format!("node returned HTTP {status}"), false),
        };
        Self {
            kind,
            message,
            http_status: Some(status),
            retryable,
        }
    }

    /// Returns `true` if this failure is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    /// Returns `true` if retrying later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

// ============================================
// ClientError
// ============================================

/// Raw failure inside `NodeClient`, before classification.
#[derive(Error, Debug)]
pub(crate) enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("node returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("node declared the new session invalid")]
    SessionRejected,

    #[error("decoding {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid node address: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub(crate) fn status(status: u16, body: &str) -> Self {
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        Self::Status { status, body }
    }
}

impl From<ClientError> for NodeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) => classify_reqwest(&e),
            ClientError::Status { status, body } => {
                let mut classified = NodeError::from_status(status);
                if !body.is_empty() && classified.kind != ErrorKind::Auth {
                    classified.message = format!("{}: {}", classified.message, body);
                }
                classified
            }
            ClientError::SessionRejected => {
                NodeError::new(ErrorKind::Auth, "node rejected the login", false)
            }
            ClientError::Decode { context, source } => {
                NodeError::decode(format!("unexpected JSON in {context}: {source}"))
            }
            ClientError::InvalidUrl(reason) => NodeError::unknown(format!("invalid node address: {reason}")),
        }
    }
}

fn classify_reqwest(err: &reqwest::Error) -> NodeError {
    if err.is_timeout() {
        return NodeError::timeout("request timed out");
    }
    if err.is_connect() {
        return NodeError::transport(format!("connection failed: {err}"));
    }
    if let Some(status) = err.status() {
        return NodeError::from_status(status.as_u16());
    }
    if err.is_decode() {
        return NodeError::decode(format!("invalid response body: {err}"));
    }
    if err.is_request() || err.is_body() {
        return NodeError::transport(format!("request failed: {err}"));
    }
    NodeError::unknown(err.to_string())
}

// ============================================
// Tests
// ============================================
