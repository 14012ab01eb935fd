// ============================================
// File: crates/dnsfleet-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Wires the cluster, cursor table, event broker and health monitor from
//! one configuration and owns their background tasks for the process
//! lifetime.
//!
//! ## Main Functionality
//! - `Server`: component construction and lifecycle
//! - Membership operations that keep cluster and health records in step
//! - Graceful shutdown with bounded task joins and node logout
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                  Background Tasks                    │   │
//! │  │                                                      │   │
//! │  │  ┌──────────────┐              ┌─────────────────┐  │   │
//! │  │  │ Health Loop  │              │  Cursor Reaper  │  │   │
//! │  │  │ sweep while  │              │  drop expired   │  │   │
//! │  │  │ subscribed   │              │  cursors        │  │   │
//! │  │  └──────┬───────┘              └────────┬────────┘  │   │
//! │  │         │                               │           │   │
//! │  │         ▼                               ▼           │   │
//! │  │  ┌─────────────────────────────────────────────┐   │   │
//! │  │  │        Cluster  (NodeClient per node)        │   │   │
//! │  │  └─────────────────────────────────────────────┘   │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                                                             │
//! │  shutdown: broadcast::channel(1) ─► every task's select!    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `start` is idempotent; `run` calls it
//! - Shutdown waits at most 5 seconds per task before moving on
//! - Node connections are built through a connector so tests can inject
//!   in-memory nodes
//!
//! ## Last Modified
//! v0.1.0 - Initial coordinator orchestrator

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dnsfleet_client::{ClientOptions, NodeApi, NodeClient, NodeConnectionConfig};
use dnsfleet_common::NodeId;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cluster::Cluster;
use crate::config::{validate_nodes, ServerConfig};
use crate::error::{Result, ServerError};
use crate::services::broker::EventBroker;
use crate::services::cursor::CursorManager;
use crate::services::health::HealthMonitor;
use crate::services::stream::EventStream;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the node behind a connection config.
pub type NodeConnector =
    Arc<dyn Fn(NodeConnectionConfig, &ClientOptions) -> Result<Arc<dyn NodeApi>> + Send + Sync>;

/// Connector creating HTTP `NodeClient`s.
#[must_use]
pub fn http_connector() -> NodeConnector {
    Arc::new(|config: NodeConnectionConfig, options: &ClientOptions| {
        let client = NodeClient::new(config, options.clone())?;
        Ok(Arc::new(client) as Arc<dyn NodeApi>)
    })
}

// ============================================
// Server
// ============================================

/// Cluster coordinator.
///
/// # Lifecycle
/// 1. Create with `Server::new(config)`
/// 2. Start with `server.run().await`
/// 3. Shutdown via `shutdown()` or Ctrl+C
pub struct Server {
    config: ServerConfig,
    options: ClientOptions,
    connector: NodeConnector,
    /// Connection settings of current members, for address checks.
    nodes: Mutex<BTreeMap<NodeId, NodeConnectionConfig>>,
    cluster: Arc<Cluster>,
    broker: EventBroker,
    health: Arc<HealthMonitor>,
    shutdown_tx: broadcast::Sender<()>,
    /// Subscribed at construction so a `shutdown()` before `run` is seen.
    shutdown_rx: Mutex<Option<broadcast::Receiver<()>>>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl Server {
    /// Creates a server talking HTTP to the configured nodes.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or a client cannot be
    /// built.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_connector(config, http_connector())
    }

    /// Creates a server building its nodes with `connector`.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or `connector` fails.
    pub fn with_connector(config: ServerConfig, connector: NodeConnector) -> Result<Self> {
        config.validate()?;
        let options = config.client_options();

        let cursors = Arc::new(CursorManager::new(config.cursor.ttl()));
        let cluster = Arc::new(Cluster::new(config.cluster.request_timeout(), cursors));
        let broker = EventBroker::new(config.events.channel_capacity);
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&cluster),
            broker.clone(),
            &config.health,
        ));

        let mut nodes = BTreeMap::new();
        for node_config in &config.nodes {
            let node = connector(node_config.clone(), &options).map_err(|e| {
                ServerError::startup_failed(format!("node {}: {}", node_config.id, e))
            })?;
            cluster.add_client(node)?;
            nodes.insert(node_config.id, node_config.clone());
        }
        info!(nodes = nodes.len(), "Cluster initialized");

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Ok(Self {
            config,
            options,
            connector,
            nodes: Mutex::new(nodes),
            cluster,
            broker,
            health,
            shutdown_tx,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Spawns the background tasks if they are not running yet.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        let health = Arc::clone(&self.health);
        let rx = self.shutdown_tx.subscribe();
        tasks.push(("health", tokio::spawn(async move { health.run(rx).await })));

        let cursors = Arc::clone(self.cluster.cursors());
        let interval = self.config.cursor.reap_interval();
        let rx = self.shutdown_tx.subscribe();
        tasks.push((
            "cursor-reaper",
            tokio::spawn(async move { cursors.run_reaper(interval, rx).await }),
        ));
        info!("Background tasks started");
    }

    /// Runs the server until shutdown.
    ///
    /// # Errors
    /// Startup failures surface from `new`; this does not fail today.
    pub async fn run(&self) -> Result<()> {
        info!("Starting dnsfleet coordinator v{}", env!("CARGO_PKG_VERSION"));
        self.start();
        info!(nodes = self.cluster.len(), "Coordinator started successfully");

        self.wait_for_shutdown().await;

        info!("Shutting down coordinator...");
        self.stop().await;
        info!("Coordinator shutdown complete");
        Ok(())
    }

    /// Stops background tasks and logs out of every node.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(());

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for (name, task) in tasks {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Task '{}' completed", name),
                Ok(Err(e)) => warn!("Task '{}' failed: {}", name, e),
                Err(_) => warn!("Task '{}' timed out during shutdown", name),
            }
        }

        let results = self.cluster.logout().await;
        let failed = results.values().filter(|r| !r.success()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some nodes did not accept logout");
        }
        self.cluster.cursors().clear();
    }

    async fn wait_for_shutdown(&self) {
        let taken = self.shutdown_rx.lock().take();
        let mut rx = taken.unwrap_or_else(|| self.shutdown_tx.subscribe());
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    let _ = rx.recv().await;
                }
            },
            _ = rx.recv() => info!("Shutdown requested"),
        }
    }

    /// Triggers server shutdown programmatically.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    // ========================================
    // Membership
    // ========================================

    /// Adds a node to the cluster.
    ///
    /// # Errors
    /// `NodeExists` for a known id, `ConfigInvalid` for an invalid entry or
    /// an address already in use.
    pub fn add_node(&self, config: NodeConnectionConfig) -> Result<()> {
        let mut nodes = self.nodes.lock();
        if nodes.contains_key(&config.id) {
            return Err(ServerError::NodeExists(config.id));
        }
        let mut candidate: Vec<_> = nodes.values().cloned().collect();
        candidate.push(config.clone());
        validate_nodes(&candidate)?;

        let node = (self.connector)(config.clone(), &self.options)?;
        self.cluster.add_client(node)?;
        nodes.insert(config.id, config);
        Ok(())
    }

    /// Replaces the connection settings of a node.
    ///
    /// # Errors
    /// `NodeNotFound` for an unknown id, `ConfigInvalid` for an invalid entry
    /// or an address already in use.
    pub fn update_node(&self, config: NodeConnectionConfig) -> Result<()> {
        let mut nodes = self.nodes.lock();
        if !nodes.contains_key(&config.id) {
            return Err(ServerError::NodeNotFound(config.id));
        }
        let candidate: Vec<_> = nodes
            .values()
            .map(|n| if n.id == config.id { config.clone() } else { n.clone() })
            .collect();
        validate_nodes(&candidate)?;

        self.cluster.update_client(config.id, config.clone())?;
        nodes.insert(config.id, config);
        Ok(())
    }

    /// Removes a node, ending its session and dropping its health record.
    ///
    /// # Errors
    /// `NodeNotFound` for an unknown id.
    pub async fn remove_node(&self, id: NodeId) -> Result<()> {
        if self.nodes.lock().remove(&id).is_none() {
            return Err(ServerError::NodeNotFound(id));
        }
        let node = self.cluster.remove_client(id);
        self.health.forget(id);

        if let Some(node) = node {
            if let Err(e) = node.logout().await {
                debug!(node_id = %id, "Logout of removed node failed: {}", e);
            }
        }
        Ok(())
    }

    // ========================================
    // Accessors
    // ========================================

    /// Opens a heartbeat-paced event stream on `topics`.
    pub fn subscribe<I, S>(&self, topics: I) -> EventStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventStream::new(
            self.broker.subscribe(topics),
            self.config.events.heartbeat(),
            self.shutdown_tx.subscribe(),
        )
    }

    /// The managed cluster.
    #[must_use]
    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// The health monitor.
    #[must_use]
    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// The event broker.
    #[must_use]
    pub fn broker(&self) -> &EventBroker {
        &self.broker
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("nodes", &self.cluster.node_ids())
            .field("subscribers", &self.broker.subscriber_count())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
