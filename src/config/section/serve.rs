//! `[serve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 3000                 # HTTP port number
//! mode = "normal"             # Routing mode: normal | hybrid | secure
//! ```
//!
//! `secure` mode expects requests on `<npub>.<host>` subdomains, so it is
//! usually combined with `interface = "0.0.0.0"` behind a wildcard DNS entry.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::resolve::RoutingMode;

/// Resolver server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// Routing mode.
    pub mode: RoutingMode,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 3000,
            mode: RoutingMode::Normal,
        }
    }
}
