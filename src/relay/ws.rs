//! Websocket relay transport.
//!
//! Each connection runs a reader task that routes incoming frames:
//! `OK` frames complete the matching pending publish, `EVENT`/`EOSE`/`CLOSED`
//! frames go to the subscription that requested them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::message::{ClientMessage, RelayMessage};
use super::{RelayConnection, RelayError, RelayTransport};
use crate::record::{Filter, Record};

type Sink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Items delivered to an open subscription.
enum SubItem {
    Record(Box<Record>),
    End,
}

#[derive(Default)]
struct Routes {
    pending: FxHashMap<String, oneshot::Sender<(bool, String)>>,
    subs: FxHashMap<String, mpsc::UnboundedSender<SubItem>>,
    /// Set once the reader has stopped; nothing may register afterwards.
    closed: bool,
}

/// Transport over `ws://` / `wss://`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    timeout: Duration,
}

impl WsTransport {
    /// `timeout` bounds the handshake and every request on the connection.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RelayTransport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RelayConnection>, RelayError> {
        let connect_err = |message: String| RelayError::Connect {
            url: url.to_owned(),
            message,
        };

        let (stream, _) = tokio::time::timeout(self.timeout, connect_async(url))
            .await
            .map_err(|_| connect_err("handshake timed out".into()))?
            .map_err(|e| connect_err(e.to_string()))?;

        let (sink, mut source) = stream.split();
        let routes = Arc::new(Mutex::new(Routes::default()));

        let reader_routes = Arc::clone(&routes);
        let reader_url = url.to_owned();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                match RelayMessage::parse(text.as_str()) {
                    Ok(msg) => dispatch(&reader_routes, msg, &reader_url),
                    Err(e) => crate::debug!("relay"; "{}: {}", reader_url, e),
                }
            }
            // Dropping senders wakes every waiter with a closed-channel error.
            let mut routes = reader_routes.lock();
            routes.closed = true;
            routes.pending.clear();
            routes.subs.clear();
        });

        Ok(Arc::new(WsConnection {
            url: url.to_owned(),
            timeout: self.timeout,
            sink: tokio::sync::Mutex::new(sink),
            routes,
            next_sub: AtomicU64::new(0),
            reader,
        }))
    }
}

fn dispatch(routes: &Mutex<Routes>, msg: RelayMessage, url: &str) {
    let mut routes = routes.lock();
    match msg {
        RelayMessage::Ok {
            id,
            accepted,
            message,
        } => {
            if let Some(tx) = routes.pending.remove(&id) {
                let _ = tx.send((accepted, message));
            }
        }
        RelayMessage::Event { sub, record } => {
            if let Some(tx) = routes.subs.get(&sub) {
                let _ = tx.send(SubItem::Record(record));
            }
        }
        RelayMessage::Eose(sub) => {
            if let Some(tx) = routes.subs.get(&sub) {
                let _ = tx.send(SubItem::End);
            }
        }
        RelayMessage::Closed { sub, message } => {
            crate::debug!("relay"; "{} closed subscription {}: {}", url, sub, message);
            if let Some(tx) = routes.subs.remove(&sub) {
                let _ = tx.send(SubItem::End);
            }
        }
        RelayMessage::Notice(notice) => crate::debug!("relay"; "{} notice: {}", url, notice),
    }
}

struct WsConnection {
    url: String,
    timeout: Duration,
    sink: tokio::sync::Mutex<Sink>,
    routes: Arc<Mutex<Routes>>,
    next_sub: AtomicU64,
    reader: tokio::task::JoinHandle<()>,
}

impl WsConnection {
    async fn send(&self, msg: ClientMessage<'_>) -> Result<(), RelayError> {
        let text = msg.to_json()?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| RelayError::Closed(self.url.clone()))
    }
}

#[async_trait]
impl RelayConnection for WsConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn publish(&self, record: &Record) -> Result<(), RelayError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut routes = self.routes.lock();
            if routes.closed {
                return Err(RelayError::Closed(self.url.clone()));
            }
            routes.pending.insert(record.id.clone(), tx);
        }

        let result = async {
            self.send(ClientMessage::Event(record)).await?;
            let (accepted, message) = tokio::time::timeout(self.timeout, rx)
                .await
                .map_err(|_| RelayError::Timeout(format!("OK from {}", self.url)))?
                .map_err(|_| RelayError::Closed(self.url.clone()))?;
            if accepted {
                Ok(())
            } else {
                Err(RelayError::Rejected {
                    url: self.url.clone(),
                    message,
                })
            }
        }
        .await;

        self.routes.lock().pending.remove(&record.id);
        result
    }

    async fn query(&self, filter: &Filter) -> Result<Vec<Record>, RelayError> {
        let sub = format!("q{}", self.next_sub.fetch_add(1, Ordering::Relaxed));
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut routes = self.routes.lock();
            if routes.closed {
                return Err(RelayError::Closed(self.url.clone()));
            }
            routes.subs.insert(sub.clone(), tx);
        }

        let collected = async {
            self.send(ClientMessage::Req { sub: &sub, filter }).await?;
            let mut records = Vec::new();
            let deadline = tokio::time::Instant::now() + self.timeout;
            loop {
                match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(Some(SubItem::Record(record))) => records.push(*record),
                    Ok(Some(SubItem::End)) => break,
                    Ok(None) => return Err(RelayError::Closed(self.url.clone())),
                    // Relays that never send EOSE still return what arrived.
                    Err(_) if !records.is_empty() => break,
                    Err(_) => return Err(RelayError::Timeout(format!("EOSE from {}", self.url))),
                }
            }
            Ok(records)
        }
        .await;

        self.routes.lock().subs.remove(&sub);
        let _ = self.send(ClientMessage::Close(&sub)).await;
        collected
    }

    async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
        self.reader.abort();
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
