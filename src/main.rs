//! stripestore CLI
//!
//! Command surface over the stripe manager and node server: store a
//! file across the cluster, recover it from the survivors, serve one
//! node's blob store, probe cluster liveness, or purge a session.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod codec;
mod config;
mod error;
mod gf;
mod manager;
mod protocol;
mod server;
mod storage;

use crate::config::{parse_block_size, ClusterConfig};
use crate::error::Result;
use crate::manager::{StripeManager, StripeManagerConfig};
use crate::server::NodeServer;
use crate::storage::{BlockStore, DirectoryStore, RemoteStore};

// =============================================================================
// CLI Arguments
// =============================================================================

/// stripestore - RAID-6 style erasure-coded block storage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cluster configuration file (JSON node list)
    #[arg(long, env = "STRIPESTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stripe a file across the cluster
    Store {
        /// Path of the file to store
        file: PathBuf,

        /// Fragment length, e.g. 64KB or 1MB
        #[arg(long, default_value = "64KB")]
        block_size: String,
    },

    /// Recover the stored file from the surviving nodes
    Recover {
        /// Output path; defaults to recovered_<original_filename>
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write reconstructed fragments back to online nodes
        #[arg(long)]
        writeback: bool,

        /// Verify parity consistency of intact stripes
        #[arg(long)]
        verify: bool,
    },

    /// Run one storage node server
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:5001")]
        listen: String,

        /// Blob storage directory
        #[arg(long, default_value = "storage")]
        dir: PathBuf,
    },

    /// Probe every node for liveness
    Probe,

    /// Delete the stored session from all nodes
    Purge,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let cluster = match &cli.config {
        Some(path) => ClusterConfig::from_file(path)?,
        None => ClusterConfig::default(),
    };
    cluster.validate()?;

    match cli.command {
        Command::Store { file, block_size } => {
            let block_size = parse_block_size(&block_size)?;
            run_store(&cluster, &file, block_size).await
        }
        Command::Recover {
            output,
            writeback,
            verify,
        } => run_recover(&cluster, output, writeback, verify).await,
        Command::Serve { listen, dir } => run_serve(&listen, &dir).await,
        Command::Probe => run_probe(&cluster).await,
        Command::Purge => run_purge(&cluster).await,
    }
}

// =============================================================================
// Commands
// =============================================================================

fn remote_nodes(cluster: &ClusterConfig) -> Vec<Arc<dyn BlockStore>> {
    cluster
        .nodes
        .iter()
        .enumerate()
        .map(|(index, addr)| {
            Arc::new(RemoteStore::new(index, addr.endpoint())) as Arc<dyn BlockStore>
        })
        .collect()
}

async fn run_store(cluster: &ClusterConfig, file: &PathBuf, block_size: usize) -> Result<()> {
    let payload = tokio::fs::read(file).await?;
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unnamed")
        .to_string();

    let manager = StripeManager::new(StripeManagerConfig::default(), remote_nodes(cluster))?;
    let report = manager.store(&payload, &filename, block_size).await?;

    info!(
        "stored {} ({} bytes) as {} stripes, {} fragments, metadata on {}/{} nodes",
        report.filename,
        report.payload_size,
        report.total_stripes,
        report.fragments_written,
        report.metadata_replicas,
        cluster.nodes.len()
    );
    for issue in &report.node_errors {
        warn!("metadata: {}", issue);
    }
    Ok(())
}

async fn run_recover(
    cluster: &ClusterConfig,
    output: Option<PathBuf>,
    writeback: bool,
    verify: bool,
) -> Result<()> {
    let config = StripeManagerConfig {
        writeback,
        verify_intact: verify,
        ..Default::default()
    };
    let manager = StripeManager::new(config, remote_nodes(cluster))?;

    let recovery = manager.recover().await?;
    let report = &recovery.report;

    let output = output.unwrap_or_else(|| {
        PathBuf::from(format!("recovered_{}", recovery.metadata.original_filename))
    });
    tokio::fs::write(&output, &recovery.payload).await?;

    info!(
        "recovered {} bytes to {:?} ({} stripes reconstructed, {} written back)",
        recovery.payload.len(),
        output,
        report.reconstructed_stripes.len(),
        report.fragments_written_back
    );
    for name in &report.corrupted_fragments {
        warn!("corrupted fragment demoted to missing: {}", name);
    }
    if !report.unrecoverable_stripes.is_empty() {
        error!(
            "{} stripes unrecoverable and zero-filled: {:?}",
            report.unrecoverable_stripes.len(),
            report.unrecoverable_stripes
        );
    }
    Ok(())
}

async fn run_serve(listen: &str, dir: &PathBuf) -> Result<()> {
    let store = Arc::new(DirectoryStore::new(dir)?);
    info!("serving blobs from {:?}", store.root());

    let server = NodeServer::new(store);
    server.run(listen).await
}

async fn run_probe(cluster: &ClusterConfig) -> Result<()> {
    let probes = cluster.nodes.iter().enumerate().map(|(index, addr)| {
        let store = RemoteStore::new(index, addr.endpoint());
        async move { (index, store.is_online().await) }
    });

    let mut online = 0;
    for (index, up) in futures::future::join_all(probes).await {
        let addr = &cluster.nodes[index];
        if up {
            online += 1;
            info!("{} online", addr);
        } else {
            warn!("{} OFFLINE", addr);
        }
    }

    info!("{}/{} nodes online", online, cluster.nodes.len());
    Ok(())
}

async fn run_purge(cluster: &ClusterConfig) -> Result<()> {
    let manager = StripeManager::new(StripeManagerConfig::default(), remote_nodes(cluster))?;
    let deleted = manager.purge().await?;
    info!("purged {} blobs", deleted);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(cli: &Cli) {
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
