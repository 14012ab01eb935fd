// ============================================
// File: crates/dnsfleet-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Last Modified
//! v0.1.0 - Initial cluster coordinator errors

use thiserror::Error;

use dnsfleet_client::NodeError;
use dnsfleet_common::error::CommonError;
use dnsfleet_common::{CursorId, NodeId};

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File path
        path: String,
        /// Underlying read or parse error
        reason: String,
    },

    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted path of the offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Cursor was never issued or has expired.
    #[error("Cursor not found or expired: {0}")]
    CursorNotFound(CursorId),

    /// No member with this id.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A member with this id is already registered.
    #[error("Node already exists: {0}")]
    NodeExists(NodeId),

    /// A component could not be built at startup.
    #[error("Server failed to start: {reason}")]
    StartupFailed {
        /// What failed
        reason: String,
    },

    /// Node client construction or call failure.
    #[error(transparent)]
    Client(#[from] NodeError),

    /// Input validation failure.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ServerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }
}
