// ============================================
// File: crates/dnsfleet-server/src/main.rs
// ============================================
//! # dnsfleet Entry Point
//!
//! ## Creation Reason
//! Binary entry point for the cluster coordinator. Handles CLI parsing,
//! logging setup and configuration loading.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Coordinator execution
//! - One-shot configuration and node checks
//!
//! ## Usage
//! ```bash
//! dnsfleet start --config /etc/dnsfleet/dnsfleet.toml
//! dnsfleet validate --config ./dnsfleet.toml   # Print the loaded settings
//! dnsfleet nodes --config ./dnsfleet.toml      # Check every node once
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Logging is initialized after the config is read so `logging.level`
//!   applies; `RUST_LOG` still wins when set
//! - Node passwords are never printed
//! - Exits with status 2 when the configuration cannot be used
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dnsfleet_server::{Server, ServerConfig, ServerError};

const DEFAULT_CONFIG: &str = "/etc/dnsfleet/dnsfleet.toml";

/// Exit status for unreadable or invalid configuration.
const EXIT_CONFIG: i32 = 2;

// ============================================
// CLI Definition
// ============================================

/// Coordinator for a fleet of DNS filter nodes
#[derive(Parser, Debug)]
#[command(name = "dnsfleet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the coordinator until Ctrl+C
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Validate a configuration file and print a summary
    Validate {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Query the session status of every configured node once
    Nodes {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start { config } => cmd_start(&config).await,
        Commands::Validate { config } => cmd_validate(&config).await,
        Commands::Nodes { config } => cmd_nodes(&config).await,
    };

    if let Err(e) = result {
        init_logging("info");
        error!("{:#}", e);
        let config_error = e
            .downcast_ref::<ServerError>()
            .is_some_and(ServerError::is_config_error);
        std::process::exit(if config_error { EXIT_CONFIG } else { 1 });
    }
}

// ============================================
// Commands
// ============================================

async fn cmd_start(config_path: &Path) -> anyhow::Result<()> {
    let config = ServerConfig::load(config_path).await?;
    init_logging(&config.logging.level);

    info!("════════════════════════════════════════");
    info!("Nodes:          {}", config.nodes.len());
    info!("Call timeout:   {}s", config.cluster.request_timeout_secs);
    info!("Health poll:    {}s (grace {}s)", config.health.polling_interval_secs, config.health.grace_period_secs);
    info!("════════════════════════════════════════");

    let server = Server::new(config)?;
    server.run().await?;
    Ok(())
}

async fn cmd_validate(config_path: &Path) -> anyhow::Result<()> {
    let config = ServerConfig::load(config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Cluster:");
    println!("   Call Timeout:     {}s", config.cluster.request_timeout_secs);
    println!("   Session TTL:      {}s", config.cluster.session_ttl_secs);
    println!();
    println!("Cursors:");
    println!("   TTL:              {}s", config.cursor.ttl_secs);
    println!("   Reap Interval:    {}s", config.cursor.reap_interval_secs);
    println!();
    println!("Health:");
    println!("   Poll Interval:    {}s", config.health.polling_interval_secs);
    println!("   Grace Period:     {}s", config.health.grace_period_secs);
    println!();
    println!("Events:");
    println!("   Heartbeat:        {}s", config.events.heartbeat_secs);
    println!("   Channel Capacity: {}", config.events.channel_capacity);
    println!();
    println!("Nodes ({}):", config.nodes.len());
    for node in &config.nodes {
        println!("   [{}] {:<16} {}", node.id, node.name, node.base_url());
    }
    println!();

    Ok(())
}

async fn cmd_nodes(config_path: &Path) -> anyhow::Result<()> {
    let config = ServerConfig::load(config_path).await?;
    init_logging(&config.logging.level);

    let server = Server::new(config)?;
    let results = server.cluster().auth_status().await;

    for result in results.values() {
        let node = result.node();
        match (result.response(), result.error()) {
            (Some(auth), _) if auth.valid => {
                println!("✅ [{}] {:<16} online   {:.1}ms", node.id, node.name, auth.took_ms);
            }
            (Some(auth), _) => {
                println!("⚠️  [{}] {:<16} degraded {:.1}ms", node.id, node.name, auth.took_ms);
            }
            (None, error) => {
                let reason = error.map(ToString::to_string).unwrap_or_default();
                println!("❌ [{}] {:<16} offline  {}", node.id, node.name, reason);
            }
        }
    }

    server.cluster().logout().await;
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
