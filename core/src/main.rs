//! DNA Messenger node entry point.
//!
//! Grounded on `zhtp`'s orchestrator binary: install the crypto providers a
//! library needs before first use, initialize `tracing` from `RUST_LOG` (or
//! `info` by default), then dispatch a small `clap` CLI — scaled down from
//! that binary's dozen orchestrated subcommands to the handful this system
//! actually exposes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use dna_core::config;
use dna_core::orchestrator::Node;

#[derive(Parser, Debug)]
#[command(name = "dna-messenger", author, version, about = "DNA Messenger P2P node")]
struct Cli {
    /// Path to a TOML configuration file. Missing fields fall back to
    /// defaults; a missing file falls back to defaults entirely.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap the node and run until interrupted.
    Run,
    /// Send a direct message to a contact, identified by hex fingerprint.
    Send {
        #[arg(long)]
        to: String,
        message: String,
    },
    /// Create a new group and print its uuid.
    CreateGroup {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    info!("starting dna-messenger node");
    let node = Node::bootstrap(config).await?;

    match cli.command {
        Command::Run => {
            info!(fingerprint = %dna_identity::fingerprint_hex(&node.identity.fingerprint), "node running, press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
        }
        Command::Send { to, message } => {
            let fingerprint = parse_fingerprint(&to)?;
            node.send_direct(&fingerprint, message.as_bytes()).await?;
            info!("message sent");
        }
        Command::CreateGroup { name, description } => {
            let group = node.gsk.create_group(name, description).await?;
            println!("{}", group.uuid);
        }
    }

    node.shutdown().await;
    Ok(())
}

fn parse_fingerprint(hex_str: &str) -> anyhow::Result<dna_identity::Fingerprint> {
    let bytes = hex::decode(hex_str)?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("fingerprint must be exactly 64 bytes (128 hex characters)"))
}
