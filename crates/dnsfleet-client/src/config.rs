// ============================================
// File: crates/dnsfleet-client/src/config.rs
// ============================================
//! # Node Connection Settings
//!
//! ## Creation Reason
//! Holds everything needed to reach and authenticate against one upstream
//! node, plus the client-wide options shared by every node.
//!
//! ## Main Functionality
//! - `NodeConnectionConfig`: id, name, scheme, host, port, password
//! - `Secret`: Password wrapper that is redacted in logs and wiped on drop
//! - `Scheme`: `http` or `https`
//! - `ClientOptions`: Request timeout, session TTL cap, user agent
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Secret` intentionally has no `Display` and a redacted `Debug`
//! - `NodeConnectionConfig` deserializes straight from a `[[nodes]]` TOML table
//!
//! ## Last Modified
//! v0.1.0 - Initial connection settings

use std::fmt;
use std::time::Duration;

use dnsfleet_common::{CommonError, NodeId, NodeIdentity};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

// ============================================
// Constants
// ============================================

/// Default timeout for a single upstream request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on how long a session is trusted locally.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(1800);

/// Default User-Agent sent to nodes.
pub const DEFAULT_USER_AGENT: &str = concat!("dnsfleet/", env!("CARGO_PKG_VERSION"));

// ============================================
// Secret
// ============================================

/// A password that never appears in logs.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the secret for the one place that must send it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no secret is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================
// Scheme
// ============================================

/// URL scheme used to reach a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

// ============================================
// NodeConnectionConfig
// ============================================

/// Connection settings for one upstream node.
#[derive(Clone, Deserialize)]
pub struct NodeConnectionConfig {
    /// Node identifier, unique within the cluster
    pub id: NodeId,
    /// Human readable name
    pub name: String,
    /// URL scheme
    #[serde(default)]
    pub scheme: Scheme,
    /// Host name or IP address
    pub host: String,
    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Web interface password
    #[serde(default)]
    pub password: Secret,
}

fn default_port() -> u16 {
    80
}

impl NodeConnectionConfig {
    /// Creates settings with the default scheme and port.
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        host: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scheme: Scheme::default(),
            host: host.into(),
            port: default_port(),
            password: Secret::new(password),
        }
    }

    /// Sets the scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Returns the light identity of this node.
    #[must_use]
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity::new(self.id, self.name.clone(), self.host.clone())
    }

    /// Returns `host:port`, used for duplicate detection.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the API base URL, e.g. `http://10.0.0.2:80/api/`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/api/", self.scheme, self.host, self.port)
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// Returns `CommonError::InvalidInput` for an empty name or host or a zero port.
    pub fn validate(&self) -> dnsfleet_common::Result<()> {
        if self.name.trim().is_empty() {
            return Err(CommonError::invalid_input("name", "cannot be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(CommonError::invalid_input("host", "cannot be empty"));
        }
        if self.host.contains('/') {
            return Err(CommonError::invalid_input("host", "must not contain a path"));
        }
        if self.port == 0 {
            return Err(CommonError::invalid_input("port", "cannot be 0"));
        }
        Ok(())
    }
}

impl fmt::Debug for NodeConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConnectionConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.base_url())
            .finish_non_exhaustive()
    }
}

// ============================================
// ClientOptions
// ============================================

/// Options shared by every `NodeClient`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout of one HTTP request
    pub request_timeout: Duration,
    /// Upper bound on the validity trusted for a session
    pub session_ttl: Duration,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session_ttl: DEFAULT_SESSION_TTL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

// ============================================
// Tests
// ============================================
