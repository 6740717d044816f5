//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::resolve::RoutingMode;

/// Publish static sites to relays and serve them back over HTTP
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Config file path (default: ~/.relayhost/config.toml)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Publish a site directory to the configured relays
    #[command(visible_alias = "d")]
    Deploy {
        /// Site directory containing index.html
        #[arg(short, long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
        path: PathBuf,

        /// Publish mutable records addressed by identifier
        #[arg(short = 'r', long)]
        mutable: bool,

        /// Root identifier for mutable deploys (prompted when omitted)
        #[arg(short = 'd', long)]
        identifier: Option<String>,
    },

    /// Serve published sites over HTTP
    #[command(visible_alias = "s")]
    Serve {
        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Routing mode
        #[arg(short, long, value_enum)]
        mode: Option<RoutingMode>,
    },

    /// Add a relay to the relay list
    AddRelay {
        /// Relay URL (ws:// or wss://)
        url: String,
    },

    /// Remove a relay from the relay list
    RemoveRelay {
        url: String,
    },

    /// Print the relays in use
    ListRelays,

    /// Store the signing key (hex or nsec)
    SetPrivate {
        key: String,
    },

    /// Print the public key of the stored signing key
    ShowPublic,

    /// Generate and store a new signing key
    GenerateKey {
        /// Overwrite an existing key without asking
        #[arg(short, long)]
        force: bool,
    },
}
