//! In-memory relay network for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{RelayConnection, RelayError, RelayTransport};
use crate::record::{Filter, Record};

/// A simulated relay storing every accepted record.
#[derive(Default)]
pub struct MemoryRelay {
    records: Mutex<Vec<Record>>,
    online: AtomicBool,
    rejecting: AtomicBool,
    publish_attempts: AtomicUsize,
}

impl MemoryRelay {
    /// Store a record directly, bypassing publish.
    pub fn insert(&self, record: Record) {
        self.records.lock().push(record);
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Answer every publish with `OK false`.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }
}

/// Relays keyed by url.
#[derive(Default)]
pub struct MemoryNetwork {
    relays: Mutex<FxHashMap<String, Arc<MemoryRelay>>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_relay(&self, url: &str) -> Arc<MemoryRelay> {
        let relay = Arc::new(MemoryRelay::default());
        relay.set_online(true);
        self.relays.lock().insert(url.to_owned(), Arc::clone(&relay));
        relay
    }

    pub fn relay(&self, url: &str) -> Option<Arc<MemoryRelay>> {
        self.relays.lock().get(url).cloned()
    }

    pub fn transport(self: &Arc<Self>) -> Arc<dyn RelayTransport> {
        Arc::new(MemoryTransport {
            network: Arc::clone(self),
        })
    }
}

struct MemoryTransport {
    network: Arc<MemoryNetwork>,
}

#[async_trait]
impl RelayTransport for MemoryTransport {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RelayConnection>, RelayError> {
        match self.network.relay(url) {
            Some(relay) if relay.online.load(Ordering::SeqCst) => Ok(Arc::new(MemoryConnection {
                url: url.to_owned(),
                relay,
            })),
            _ => Err(RelayError::Connect {
                url: url.to_owned(),
                message: "connection refused".into(),
            }),
        }
    }
}

struct MemoryConnection {
    url: String,
    relay: Arc<MemoryRelay>,
}

impl MemoryConnection {
    fn ensure_online(&self) -> Result<(), RelayError> {
        if self.relay.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::Closed(self.url.clone()))
        }
    }
}

#[async_trait]
impl RelayConnection for MemoryConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn publish(&self, record: &Record) -> Result<(), RelayError> {
        self.relay.publish_attempts.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        if self.relay.rejecting.load(Ordering::SeqCst) {
            return Err(RelayError::Rejected {
                url: self.url.clone(),
                message: "blocked".into(),
            });
        }
        if !record.verify() {
            return Err(RelayError::Rejected {
                url: self.url.clone(),
                message: "invalid: bad signature".into(),
            });
        }
        self.relay.insert(record.clone());
        Ok(())
    }

    async fn query(&self, filter: &Filter) -> Result<Vec<Record>, RelayError> {
        self.ensure_online()?;
        Ok(self
            .relay
            .records
            .lock()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn close(&self) {}
}
