//! Connection pool over the configured relays.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;

use super::{RelayConnection, RelayError, RelayTransport};
use crate::record::{Filter, Record};

/// Configured relays plus cached connections to them.
pub struct RelayPool {
    transport: Arc<dyn RelayTransport>,
    urls: Vec<String>,
    connections: DashMap<String, Arc<dyn RelayConnection>>,
}

impl std::fmt::Debug for RelayPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayPool")
            .field("urls", &self.urls)
            .finish_non_exhaustive()
    }
}

impl RelayPool {
    pub fn new(transport: Arc<dyn RelayTransport>, urls: Vec<String>) -> Self {
        Self {
            transport,
            urls,
            connections: DashMap::new(),
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Connect to every configured relay concurrently.
    ///
    /// Unreachable relays are logged and left out of the result.
    pub async fn connect_all(&self) -> Vec<Arc<dyn RelayConnection>> {
        let attempts = self.urls.iter().map(|url| self.connection(url));
        join_all(attempts)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(conn) => Some(conn),
                Err(e) => {
                    crate::log!("relay"; "{}", e);
                    None
                }
            })
            .collect()
    }

    /// Cached connection to `url`, opening one if needed.
    async fn connection(&self, url: &str) -> Result<Arc<dyn RelayConnection>, RelayError> {
        if let Some(conn) = self.connections.get(url) {
            return Ok(Arc::clone(conn.value()));
        }
        let conn = self.transport.connect(url).await?;
        self.connections.insert(url.to_owned(), Arc::clone(&conn));
        Ok(conn)
    }

    async fn query_one(&self, url: &str, filter: &Filter) -> Result<Vec<Record>, RelayError> {
        let conn = self.connection(url).await?;
        match conn.query(filter).await {
            Err(RelayError::Closed(_)) => {
                // Stale cached connection: reconnect once.
                self.connections.remove(url);
                self.connection(url).await?.query(filter).await
            }
            other => other,
        }
    }

    /// Query every configured relay plus `hints` and return the
    /// authoritative match: the verified record with the latest
    /// `created_at` (ties broken by lowest id).
    ///
    /// Returns `Err(Unreachable)` only when no relay answered at all.
    pub async fn query_latest(
        &self,
        filter: &Filter,
        hints: &[String],
    ) -> Result<Option<Record>, RelayError> {
        let mut urls: Vec<&str> = self.urls.iter().map(String::as_str).collect();
        for hint in hints {
            if !urls.contains(&hint.as_str()) {
                urls.push(hint.as_str());
            }
        }
        if urls.is_empty() {
            return Err(RelayError::Unreachable);
        }

        let results = join_all(urls.iter().map(|url| self.query_one(url, filter))).await;

        let mut answered = false;
        let mut best: Option<Record> = None;
        for result in results {
            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    crate::debug!("relay"; "{}", e);
                    continue;
                }
            };
            answered = true;
            for record in records {
                if !filter.matches(&record) || !record.verify() {
                    continue;
                }
                let newer = best.as_ref().is_none_or(|b| {
                    record.created_at > b.created_at
                        || (record.created_at == b.created_at && record.id < b.id)
                });
                if newer {
                    best = Some(record);
                }
            }
        }

        if answered {
            Ok(best)
        } else {
            Err(RelayError::Unreachable)
        }
    }

    /// Connect to each relay with a fresh connection bounded by `timeout`.
    ///
    /// Returns `(url, reachable)` in configuration order.
    pub async fn probe(&self, timeout: Duration) -> Vec<(String, bool)> {
        let checks = self.urls.iter().map(|url| async move {
            let reachable = match tokio::time::timeout(timeout, self.transport.connect(url)).await
            {
                Ok(Ok(conn)) => {
                    conn.close().await;
                    true
                }
                _ => false,
            };
            (url.clone(), reachable)
        });
        join_all(checks).await
    }

    /// Close every cached connection.
    pub async fn close(&self) {
        let conns: Vec<_> = self
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.connections.clear();
        join_all(conns.iter().map(|c| c.close())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordKind;
    use crate::record::{Clock, Keys, RecordBuilder, Tags};
    use crate::relay::memory::MemoryNetwork;

    fn mutable(keys: &Keys, content: &str, after: u64) -> Record {
        RecordBuilder::with_clock(keys, Clock::after(after))
            .build(content.into(), RecordKind::MarkupMutable, Tags::new().with("d", "site"))
            .unwrap()
    }

    fn address(keys: &Keys) -> Filter {
        Filter::new()
            .kinds(&RecordKind::MUTABLE_SERVABLE)
            .author(keys.public_hex())
            .identifier("site")
    }

    #[tokio::test]
    async fn test_connect_all_skips_unreachable() {
        let network = MemoryNetwork::new();
        network.add_relay("wss://a");
        network.add_relay("wss://b");
        let pool = RelayPool::new(
            network.transport(),
            vec!["wss://a".into(), "wss://down".into(), "wss://b".into()],
        );
        let conns = pool.connect_all().await;
        let urls: Vec<_> = conns.iter().map(|c| c.url().to_owned()).collect();
        assert_eq!(urls, ["wss://a", "wss://b"]);
    }

    #[tokio::test]
    async fn test_query_latest_last_write_wins() {
        let network = MemoryNetwork::new();
        let a = network.add_relay("wss://a");
        let b = network.add_relay("wss://b");
        let keys = Keys::generate();

        let old = mutable(&keys, "v1", 0);
        let new = mutable(&keys, "v2", old.created_at);
        a.insert(old);
        b.insert(new.clone());

        let pool = RelayPool::new(network.transport(), vec!["wss://a".into(), "wss://b".into()]);
        let found = pool.query_latest(&address(&keys), &[]).await.unwrap();
        assert_eq!(found.map(|r| r.content), Some(new.content));
    }

    #[tokio::test]
    async fn test_query_latest_drops_forged_records() {
        let network = MemoryNetwork::new();
        let relay = network.add_relay("wss://a");
        let keys = Keys::generate();
        let genuine = mutable(&keys, "real", 0);
        let mut forged = mutable(&keys, "fake", genuine.created_at);
        forged.content = "tampered".into();
        relay.insert(genuine.clone());
        relay.insert(forged);

        let pool = RelayPool::new(network.transport(), vec!["wss://a".into()]);
        let found = pool.query_latest(&address(&keys), &[]).await.unwrap();
        assert_eq!(found, Some(genuine));
    }

    #[tokio::test]
    async fn test_query_latest_uses_hints() {
        let network = MemoryNetwork::new();
        network.add_relay("wss://configured");
        let hinted = network.add_relay("wss://hinted");
        let keys = Keys::generate();
        let record = mutable(&keys, "x", 0);
        hinted.insert(record.clone());

        let pool = RelayPool::new(network.transport(), vec!["wss://configured".into()]);
        assert_eq!(pool.query_latest(&address(&keys), &[]).await.unwrap(), None);
        let found = pool
            .query_latest(&address(&keys), &["wss://hinted".into()])
            .await
            .unwrap();
        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn test_query_latest_unreachable() {
        let network = MemoryNetwork::new();
        let pool = RelayPool::new(network.transport(), vec!["wss://gone".into()]);
        let result = pool.query_latest(&Filter::new(), &[]).await;
        assert!(matches!(result, Err(RelayError::Unreachable)));
    }

    #[tokio::test]
    async fn test_probe() {
        let network = MemoryNetwork::new();
        network.add_relay("wss://up");
        let pool = RelayPool::new(network.transport(), vec!["wss://up".into(), "wss://down".into()]);
        let status = pool.probe(Duration::from_secs(1)).await;
        assert_eq!(
            status,
            vec![("wss://up".to_string(), true), ("wss://down".to_string(), false)]
        );
    }
}
