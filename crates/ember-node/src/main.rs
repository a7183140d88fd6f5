//! Ember Node - a hybrid PoW/PoS cryptocurrency full node.
//!
//! This is the main entry point for the ember-node binary.

use anyhow::{Context, Result};
use clap::Parser;
use ember_chain::Chain;
use ember_consensus::NetworkConfig;
use ember_network::P2pNode;
use ember_rpc::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Ember blockchain node.
#[derive(Parser, Debug)]
#[command(name = "ember-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Network to run (mainnet, testnet)
    #[arg(short, long, default_value = "mainnet")]
    network: String,

    /// Path to a network config JSON (default: networks/<network>.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (default: data/<network>)
    #[arg(short, long)]
    datadir: Option<PathBuf>,

    /// P2P port (default from network config)
    #[arg(short, long)]
    port: Option<u16>,

    /// RPC/HTTP port (default from network config)
    #[arg(long)]
    rpcport: Option<u16>,

    /// Comma-separated peer addresses (host:port) to connect to
    #[arg(long)]
    addpeer: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Ember Node v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("networks").join(format!("{}.json", args.network)));
    let config = NetworkConfig::load(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    info!(network = %config.name, ticker = %config.ticker, "network configured");
    info!(
        consensus = %config.consensus_type,
        algorithm = %config.algorithm,
        "consensus parameters loaded"
    );

    let data_dir = args
        .datadir
        .clone()
        .unwrap_or_else(|| PathBuf::from("data").join(&args.network));

    let p2p_port = args.port.unwrap_or(config.p2p_port);
    let rpc_port = args.rpcport.unwrap_or(config.rpc_port);

    let chain = Arc::new(Chain::open(config, &data_dir).context("failed to open chain")?);
    info!(
        height = chain.best_height(),
        data_dir = %data_dir.display(),
        "chain ready"
    );

    let network = P2pNode::new(Arc::clone(&chain));
    network
        .start(p2p_port)
        .await
        .context("failed to start p2p listener")?;

    if let Some(peers) = &args.addpeer {
        for addr in peers.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            info!(peer = addr, "connecting to peer");
            if let Err(e) = network.connect(addr).await {
                warn!(peer = addr, error = %e, "failed to connect to peer");
            }
        }
    }

    let rpc_addr = SocketAddr::from(([0, 0, 0, 0], rpc_port));
    let state = AppState::new(Arc::clone(&chain), Arc::clone(&network));

    info!(p2p = p2p_port, rpc = rpc_port, "node running");

    tokio::select! {
        result = ember_rpc::serve(rpc_addr, state) => {
            result.context("rpc server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!("ember node stopped");
    Ok(())
}
