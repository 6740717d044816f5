//! Relay connections.
//!
//! ```text
//! RelayPool --connect--> RelayTransport --> RelayConnection (one per url)
//!     |                                         |-- publish(record) -> OK
//!     '-- query_latest(filter) ---------------->'-- query(filter)  -> records until EOSE
//! ```

#[cfg(test)]
pub mod memory;
mod message;
mod pool;
mod ws;

use std::sync::Arc;

use async_trait::async_trait;

use crate::record::{Filter, Record};

pub use pool::RelayPool;
pub use ws::WsTransport;

/// Relay communication failures. Always scoped to a single relay.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RelayError {
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("{url} rejected record: {message}")]
    Rejected { url: String, message: String },

    #[error("connection to {0} closed")]
    Closed(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("malformed relay message: {0}")]
    Protocol(String),

    #[error("no relay could be reached")]
    Unreachable,
}

/// Opens connections to relays.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RelayConnection>, RelayError>;
}

/// An open connection to one relay.
#[async_trait]
pub trait RelayConnection: Send + Sync {
    fn url(&self) -> &str;

    /// Send a record and wait for the relay's acknowledgement.
    async fn publish(&self, record: &Record) -> Result<(), RelayError>;

    /// Fetch stored records matching `filter`, up to end-of-stored-events.
    async fn query(&self, filter: &Filter) -> Result<Vec<Record>, RelayError>;

    async fn close(&self);
}
