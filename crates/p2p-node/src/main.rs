//! # P2P Node
//!
//! Connects to one peer and logs every message it sends.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then command-line overrides)
//! 2. Create the chain API provider
//! 3. Register a logging handler
//! 4. Connect and send the initial handshake
//! 5. Run until the peer disconnects or Ctrl+C

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use p2p_client::{Client, HttpChainInfoProvider, LoggerHandler, StringLoggerHandler};

use crate::config::NodeConfig;

/// Single-peer network client
#[derive(Parser, Debug)]
#[command(name = "p2p-node")]
#[command(about = "Connect to one peer, handshake and log its traffic")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Peer address (host:port)
    #[arg(short, long)]
    peer: Option<String>,

    /// Address announced in handshakes
    #[arg(long)]
    advertise: Option<String>,

    /// Chain id (64 hex characters)
    #[arg(long)]
    chain_id: Option<String>,

    /// Chain API base URL used for the initial handshake
    #[arg(long)]
    api_url: Option<String>,

    /// Request blocks after every peer handshake
    #[arg(long)]
    request_sync: bool,

    /// Log full message contents instead of message types
    #[arg(long)]
    log_messages: bool,
}

impl Args {
    fn apply(&self, config: &mut NodeConfig) {
        if let Some(peer) = &self.peer {
            config.client.peer_address = peer.clone();
        }
        if let Some(address) = &self.advertise {
            config.client.advertised_address = Some(address.clone());
        }
        if let Some(chain_id) = &self.chain_id {
            config.client.chain_id = chain_id.clone();
        }
        if let Some(url) = &self.api_url {
            config.chain_api.url = url.clone();
        }
        if self.request_sync {
            config.client.request_sync_on_handshake = true;
        }
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    args.apply(&mut config);

    let provider = HttpChainInfoProvider::with_timeout(
        config.chain_api.url.clone(),
        config.chain_api.timeout(),
    )
    .context("failed to create chain API client")?;

    let client = Client::from_config(&config.client, Arc::new(provider))
        .context("invalid client configuration")?;

    if args.log_messages {
        client.register_handler(Arc::new(LoggerHandler));
    } else {
        client.register_handler(Arc::new(StringLoggerHandler));
    }

    client
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", config.client.peer_address))?;

    info!(
        peer = %config.client.peer_address,
        api = %config.chain_api.url,
        "Node is running. Press Ctrl+C to stop."
    );

    tokio::select! {
        reason = client.wait_disconnected() => {
            warn!(reason = %reason, "Peer connection ended");
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down");
            client.disconnect().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "p2p-node",
            "--peer",
            "10.0.0.9:9876",
            "--api-url",
            "http://10.0.0.9:8888",
            "--request-sync",
        ]);
        let mut config = NodeConfig::default();
        args.apply(&mut config);

        assert_eq!(config.client.peer_address, "10.0.0.9:9876");
        assert_eq!(config.chain_api.url, "http://10.0.0.9:8888");
        assert!(config.client.request_sync_on_handshake);
        assert!(config.client.advertised_address.is_none());
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let args = Args::parse_from(["p2p-node"]);
        let mut config = NodeConfig::default();
        args.apply(&mut config);
        assert_eq!(config, NodeConfig::default());
    }
}
