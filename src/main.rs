//! relayhost - publish static sites as signed records on relays and serve them back.

mod asset;
mod cli;
mod config;
mod core;
mod deploy;
mod html;
mod logger;
mod record;
mod relay;
mod resolve;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, serve::ServeOverrides};
use config::Settings;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let settings = Settings::load(&cli)?;

    match &cli.command {
        Commands::Deploy {
            path,
            mutable,
            identifier,
        } => cli::deploy::deploy_site(&settings, path, *mutable, identifier.as_deref()),
        Commands::Serve {
            port,
            interface,
            mode,
        } => cli::serve::serve(
            &settings,
            ServeOverrides {
                port: *port,
                interface: *interface,
                mode: *mode,
            },
        ),
        Commands::AddRelay { url } => cli::relays::add(&settings, url),
        Commands::RemoveRelay { url } => cli::relays::remove(&settings, url),
        Commands::ListRelays => cli::relays::list(&settings),
        Commands::SetPrivate { key } => cli::keys::set_private(&settings, key),
        Commands::ShowPublic => cli::keys::show_public(&settings),
        Commands::GenerateKey { force } => cli::keys::generate(&settings, *force),
    }
}
