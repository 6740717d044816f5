//! Publish scheduler: every queued record to every live relay.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::queue::PublishQueue;
use crate::logger::ProgressBar;
use crate::record::Record;
use crate::record::address::{AddressError, EventPointer};
use crate::relay::{RelayConnection, RelayError, RelayPool};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("none of the configured relays could be reached")]
    NoLiveEndpoints,

    #[error("publish queue has no root record")]
    MissingRoot,

    #[error("failed to encode root pointer: {0}")]
    Address(#[from] AddressError),
}

/// How the published site is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootAddress {
    /// `nevent` pointer of the immutable root record.
    Pointer(String),
    /// `d` identifier of the mutable root record.
    Identifier(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub root_id: String,
    pub address: RootAddress,
    /// Author public key, hex.
    pub author: String,
    pub records: usize,
    pub relays: usize,
    /// Records accepted by fewer than all live relays.
    pub partial: usize,
}

/// Bounded concurrent fan-out of a [`PublishQueue`].
pub struct PublishScheduler {
    pool: Arc<RelayPool>,
    concurrency_per_relay: usize,
    timeout: Duration,
    cancel: CancellationToken,
}

impl PublishScheduler {
    pub fn new(
        pool: Arc<RelayPool>,
        concurrency_per_relay: usize,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pool,
            concurrency_per_relay: concurrency_per_relay.max(1),
            timeout,
            cancel,
        }
    }

    /// Publish every record in `queue` and report the root's address.
    ///
    /// Per-relay failures are logged; only a pool with no reachable relay
    /// is an error.
    pub async fn publish_all(&self, queue: &PublishQueue) -> Result<PublishOutcome, PublishError> {
        let root = queue.root().ok_or(PublishError::MissingRoot)?;

        let connections = self.pool.connect_all().await;
        if connections.is_empty() {
            return Err(PublishError::NoLiveEndpoints);
        }
        let live = connections.len();
        crate::log!(
            "deploy";
            "publishing {} to {}",
            crate::utils::plural_count(queue.len(), "record"),
            crate::utils::plural_count(live, "relay")
        );

        let permits = Arc::new(Semaphore::new(live * self.concurrency_per_relay));
        let bar = ProgressBar::start("publish", queue.len());
        let done = bar.counter();
        let mut tasks = JoinSet::new();

        for record in queue.records() {
            let record = Arc::new(record.clone());
            let connections = connections.clone();
            let permits = Arc::clone(&permits);
            let done = Arc::clone(&done);
            let cancel = self.cancel.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                let attempts = connections.iter().map(|conn| {
                    attempt(conn.as_ref(), &record, &permits, &cancel, timeout)
                });
                let accepted = join_all(attempts)
                    .await
                    .into_iter()
                    .filter(|ok| *ok)
                    .count();
                *done.lock() += 1;
                accepted
            });
        }

        let mut partial = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(accepted) if accepted == live => {}
                Ok(_) => partial += 1,
                Err(e) => {
                    crate::log!("deploy"; "publish task failed: {}", e);
                    partial += 1;
                }
            }
        }
        bar.finish().await;

        if partial > 0 {
            crate::log!(
                "deploy";
                "warning: {} reached fewer than all {}",
                crate::utils::plural_count(partial, "record"),
                crate::utils::plural_count(live, "relay")
            );
        }

        Ok(PublishOutcome {
            root_id: root.id.clone(),
            address: self.root_address(root)?,
            author: root.pubkey.clone(),
            records: queue.len(),
            relays: live,
            partial,
        })
    }

    fn root_address(&self, root: &Record) -> Result<RootAddress, PublishError> {
        let mutable = root.record_kind().is_some_and(|k| k.is_mutable());
        if let (true, Some(identifier)) = (mutable, root.identifier()) {
            return Ok(RootAddress::Identifier(identifier.to_owned()));
        }
        let pointer = EventPointer {
            id: root.id.clone(),
            relays: self.pool.urls().to_vec(),
            author: Some(root.pubkey.clone()),
            kind: None,
        };
        Ok(RootAddress::Pointer(pointer.encode()?))
    }
}

/// One record to one relay, bounded by the shared permits and `timeout`.
async fn attempt(
    conn: &dyn RelayConnection,
    record: &Record,
    permits: &Semaphore,
    cancel: &CancellationToken,
    timeout: Duration,
) -> bool {
    let Ok(_permit) = permits.acquire().await else {
        return false;
    };
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => return false,
        r = tokio::time::timeout(timeout, conn.publish(record)) => {
            r.unwrap_or_else(|_| Err(RelayError::Timeout(conn.url().to_owned())))
        }
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            crate::log!("relay"; "{} ({})", e, &record.id[..8.min(record.id.len())]);
            false
        }
    }
}
