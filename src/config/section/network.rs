//! `[network]` section configuration.
//!
//! ```toml
//! [network]
//! timeout_secs = 10        # Bound for every relay request and upload attempt
//! probe_timeout_secs = 3   # Bound for health-check connections
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::super::types::ConfigDiagnostics;

/// Network timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            probe_timeout_secs: 3,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.timeout_secs == 0 {
            diag.error("network.timeout_secs", "must be at least 1");
        }
        if self.probe_timeout_secs == 0 {
            diag.error("network.probe_timeout_secs", "must be at least 1");
        }
    }
}
