//! `[deploy]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [deploy]
//! upload_endpoint = "https://nostrcheck.me/api/v1/media"  # Media upload service
//! concurrency_per_relay = 4   # In-flight publishes per connected relay
//! upload_concurrency = 8      # In-flight media uploads
//! upload_retries = 2          # Extra attempts for transient upload failures
//! ```

use serde::{Deserialize, Serialize};

use super::super::types::ConfigDiagnostics;

/// Default media upload service.
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://nostrcheck.me/api/v1/media";

/// Deploy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Multipart media upload endpoint.
    pub upload_endpoint: String,

    /// Concurrent publish attempts allowed per live relay.
    pub concurrency_per_relay: usize,

    /// Concurrent media uploads.
    pub upload_concurrency: usize,

    /// Retries after a transient upload failure (connect error, timeout, 5xx).
    pub upload_retries: u32,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            upload_endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            concurrency_per_relay: 4,
            upload_concurrency: 8,
            upload_retries: 2,
        }
    }
}

impl DeployConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        match url::Url::parse(&self.upload_endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => diag.error(
                "deploy.upload_endpoint",
                format!("`{}` is not an http(s) URL", self.upload_endpoint),
            ),
        }
        if self.concurrency_per_relay == 0 {
            diag.error("deploy.concurrency_per_relay", "must be at least 1");
        }
        if self.upload_concurrency == 0 {
            diag.error("deploy.upload_concurrency", "must be at least 1");
        }
    }
}
