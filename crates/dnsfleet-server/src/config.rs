// ============================================
// File: crates/dnsfleet-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the dnsfleet coordinator,
//! loaded from a TOML file at startup.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Defaults for every tunable
//!
//! ## Configuration Sections
//! - `logging`: Log level
//! - `cluster`: Per-call timeout, session TTL cap
//! - `cursor`: Pagination cursor TTL and reaper interval
//! - `health`: Polling interval and idle grace period
//! - `events`: Subscriber heartbeat and channel capacity
//! - `nodes`: The upstream nodes (`[[nodes]]`, one table per node)
//!
//! ## Example Configuration
//! ```toml
//! [logging]
//! level = "info"
//!
//! [cluster]
//! request_timeout_secs = 5
//!
//! [health]
//! polling_interval_secs = 5
//! grace_period_secs = 10
//!
//! [[nodes]]
//! id = 1
//! name = "living-room"
//! scheme = "http"
//! host = "10.0.0.2"
//! port = 80
//! password = "changeme"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Changes to this file require a restart; runtime membership changes
//!   go through `Server::add_node` and friends
//! - Validate config before server startup
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use dnsfleet_client::{ClientOptions, NodeConnectionConfig};
use serde::Deserialize;
use tracing::info;

use crate::error::{Result, ServerError};

/// Largest accepted value of any `*_secs` setting (one week).
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

fn check_upper_bound(field: &str, secs: u64) -> Result<()> {
    if secs > MAX_DURATION_SECS {
        return Err(ServerError::config_invalid(
            field,
            format!("must be at most {MAX_DURATION_SECS}"),
        ));
    }
    Ok(())
}

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fan-out and node client settings.
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Pagination cursor settings.
    #[serde(default)]
    pub cursor: CursorConfig,

    /// Health polling settings.
    #[serde(default)]
    pub health: HealthConfig,

    /// Event subscription settings.
    #[serde(default)]
    pub events: EventsConfig,

    /// Upstream nodes.
    #[serde(default)]
    pub nodes: Vec<NodeConnectionConfig>,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!(nodes = config.nodes.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ServerError::ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.logging.validate()?;
        self.cluster.validate()?;
        self.cursor.validate()?;
        self.health.validate()?;
        self.events.validate()?;
        validate_nodes(&self.nodes)
    }

    /// Options handed to every `NodeClient`.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            request_timeout: self.cluster.request_timeout(),
            session_ttl: Duration::from_secs(self.cluster.session_ttl_secs),
            ..ClientOptions::default()
        }
    }
}

impl FromStr for ServerConfig {
    type Err = ServerError;

    /// Loads configuration from a string (useful for testing).
    fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Checks node entries individually and for duplicate ids or addresses.
///
/// # Errors
/// Returns `ServerError::ConfigInvalid` for the first bad entry.
pub fn validate_nodes(nodes: &[NodeConnectionConfig]) -> Result<()> {
    let mut ids = HashSet::new();
    let mut addresses = HashSet::new();
    for (i, node) in nodes.iter().enumerate() {
        node.validate()
            .map_err(|e| ServerError::config_invalid(format!("nodes[{i}]"), e.to_string()))?;
        if !ids.insert(node.id) {
            return Err(ServerError::config_invalid(
                format!("nodes[{i}].id"),
                format!("duplicate node id {}", node.id),
            ));
        }
        if !addresses.insert(node.address()) {
            return Err(ServerError::config_invalid(
                format!("nodes[{i}].host"),
                format!("duplicate host:port {}", node.address()),
            ));
        }
    }
    Ok(())
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(ServerError::config_invalid(
                "logging.level",
                format!("'{}' is not one of {}", self.level, LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// ClusterConfig
// ============================================

/// Fan-out configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Timeout of one node call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on trusted session validity, in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

fn default_request_timeout() -> u64 {
    5
}

fn default_session_ttl() -> u64 {
    1800
}

impl ClusterConfig {
    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(ServerError::config_invalid(
                "cluster.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err(ServerError::config_invalid(
                "cluster.session_ttl_secs",
                "must be greater than 0",
            ));
        }
        check_upper_bound("cluster.request_timeout_secs", self.request_timeout_secs)?;
        check_upper_bound("cluster.session_ttl_secs", self.session_ttl_secs)
    }

    /// Per-call timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

// ============================================
// CursorConfig
// ============================================

/// Pagination cursor configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct CursorConfig {
    /// Cursor lifetime in seconds.
    #[serde(default = "default_cursor_ttl")]
    pub ttl_secs: u64,

    /// Seconds between background sweeps of expired cursors.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

fn default_cursor_ttl() -> u64 {
    300
}

fn default_reap_interval() -> u64 {
    60
}

impl CursorConfig {
    fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(ServerError::config_invalid("cursor.ttl_secs", "must be greater than 0"));
        }
        if self.reap_interval_secs == 0 {
            return Err(ServerError::config_invalid(
                "cursor.reap_interval_secs",
                "must be greater than 0",
            ));
        }
        check_upper_bound("cursor.ttl_secs", self.ttl_secs)?;
        check_upper_bound("cursor.reap_interval_secs", self.reap_interval_secs)
    }

    /// Cursor lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Reaper interval.
    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cursor_ttl(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

// ============================================
// HealthConfig
// ============================================

/// Health polling configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Seconds between sweeps while subscribers are present.
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// Seconds polling continues after the last subscriber left.
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

fn default_polling_interval() -> u64 {
    5
}

fn default_grace_period() -> u64 {
    10
}

impl HealthConfig {
    fn validate(&self) -> Result<()> {
        if self.polling_interval_secs < 1 {
            return Err(ServerError::config_invalid(
                "health.polling_interval_secs",
                "must be at least 1",
            ));
        }
        check_upper_bound("health.polling_interval_secs", self.polling_interval_secs)?;
        check_upper_bound("health.grace_period_secs", self.grace_period_secs)
    }

    /// Polling interval before jitter.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    /// Grace period.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            polling_interval_secs: default_polling_interval(),
            grace_period_secs: default_grace_period(),
        }
    }
}

// ============================================
// EventsConfig
// ============================================

/// Event subscription configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Seconds between heartbeat frames on idle streams.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// Buffered events per subscriber before events are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_heartbeat() -> u64 {
    20
}

fn default_channel_capacity() -> usize {
    16
}

impl EventsConfig {
    fn validate(&self) -> Result<()> {
        if self.heartbeat_secs < 5 {
            return Err(ServerError::config_invalid("events.heartbeat_secs", "must be at least 5"));
        }
        if self.channel_capacity == 0 {
            return Err(ServerError::config_invalid(
                "events.channel_capacity",
                "must be greater than 0",
            ));
        }
        check_upper_bound("events.heartbeat_secs", self.heartbeat_secs)
    }

    /// Heartbeat interval.
    #[must_use]
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

// ============================================
// Tests
// ============================================
