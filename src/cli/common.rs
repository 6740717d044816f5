//! Common utilities shared across CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use crate::config::{ConfigError, EndpointSet, Settings};
use crate::relay::{RelayPool, WsTransport};

/// Multi-threaded runtime for the async core.
pub fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

/// Relay pool over the configured endpoints.
///
/// Fails when no relay is configured at all.
pub fn relay_pool(settings: &Settings) -> Result<Arc<RelayPool>> {
    let endpoints = EndpointSet::load(&settings.paths().relays())?;
    if endpoints.is_empty() {
        return Err(ConfigError::NoRelays.into());
    }
    let transport = Arc::new(WsTransport::new(settings.network.timeout()));
    Ok(Arc::new(RelayPool::new(transport, endpoints.into_urls())))
}
