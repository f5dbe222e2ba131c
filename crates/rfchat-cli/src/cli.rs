//! Command-line interface definitions and parsing

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Data directory for conversation and message history
    #[arg(short, long)]
    pub data_dir: Option<String>,

    /// Display name announced to peers
    #[arg(short, long)]
    pub name: Option<String>,

    /// Address to listen on
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Wait for a peer to connect, then chat
    Listen,
    /// Connect to a listening peer, then chat
    Connect {
        /// Peer address (host:port)
        address: String,
        /// Name to show for the peer until it announces its own
        #[arg(long)]
        peer_name: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}
