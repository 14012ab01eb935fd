// ============================================
// File: crates/dnsfleet-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the identifiers used throughout dnsfleet so that node ids and
//! pagination cursors cannot be confused with arbitrary integers or strings.
//!
//! ## Main Functionality
//! - `NodeId`: Numeric identifier of an upstream node
//! - `NodeIdentity`: Light, immutable reference to a node (id, name, host)
//! - `CursorId`: Opaque random pagination token (16 bytes)
//!
//! ## ⚠️ Important Note for Next Developer
//! - `CursorId` is handed to API callers and acts as a capability token;
//!   never derive it from upstream cursors or counters
//! - The string form of `CursorId` is URL-safe base64 without padding, so it
//!   can travel in query strings unescaped
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Size of CursorId in bytes
pub const CURSOR_ID_SIZE: usize = 16;

// ============================================
// NodeId
// ============================================

/// Identifier of one upstream node in the cluster.
///
/// Ordered so that result maps keyed by `NodeId` iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(i64);

impl NodeId {
    /// Creates a new `NodeId` from its raw value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<NodeId> for i64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

// ============================================
// NodeIdentity
// ============================================

/// Light identity of a node, attached to every per-node result.
///
/// Deliberately carries no connection settings or credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Node identifier
    pub id: NodeId,
    /// Human readable node name
    pub name: String,
    /// Host name or address of the node
    pub host: String,
}

impl NodeIdentity {
    /// Creates a new `NodeIdentity`.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.name, self.id, self.host)
    }
}

// ============================================
// CursorId
// ============================================

/// Opaque identifier of a server-side pagination cursor.
///
/// # Security Properties
/// - Generated from the thread-local CSPRNG
/// - 128 bits of entropy
/// - Carries no information about the per-node offsets it refers to
///
/// # Example
/// ```
/// use dnsfleet_common::types::CursorId;
///
/// let id = CursorId::generate();
/// let parsed: CursorId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId([u8; CURSOR_ID_SIZE]);

impl CursorId {
    /// Generates a new random `CursorId`.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = [0u8; CURSOR_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut id);
        Self(id)
    }

    /// Creates a `CursorId` from raw bytes.
    ///
    /// Returns `None` unless exactly 16 bytes are given.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let id: [u8; CURSOR_ID_SIZE] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CURSOR_ID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only show a prefix, the full value is a capability
        write!(
            f,
            "CursorId({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64.encode(self.0))
    }
}

impl FromStr for CursorId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64.decode(s.trim())?;
        Self::from_bytes(&bytes).ok_or(CommonError::InvalidLength {
            expected: CURSOR_ID_SIZE,
            actual: bytes.len(),
        })
    }
}

impl Serialize for CursorId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CursorId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Tests
// ============================================
