//! Cross-reader notification of publish cache changes.
//!
//! Two transports implement [`LocalBroadcast`]: [`ChannelBroadcast`] hands events to the
//! other endpoints of an in-process bus, and [`StorageBroadcast`] writes them to the
//! shared local store where other readers poll for them. Neither echoes an event back to
//! the endpoint that posted it.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::local_store::LocalStore,
    services::publish_cache::CacheEvent,
    subscription::{FEED_CAPACITY, Subscription},
};

/// Local store key carrying the last event posted by the storage transport.
pub const BROADCAST_KEY: &str = "pollBroadcast";

const BUS_CAPACITY: usize = 32;

/// Transport shared by the readers of one deployment.
pub trait LocalBroadcast: Send + Sync {
    /// Deliver `event` to every other endpoint.
    fn post(&self, event: &CacheEvent);
    /// Feed of events posted by other endpoints.
    fn listen(&self) -> Subscription<CacheEvent>;
}

#[derive(Debug, Clone)]
struct Envelope {
    origin: Uuid,
    event: CacheEvent,
}

/// Endpoint of an in-process broadcast bus.
#[derive(Clone)]
pub struct ChannelBroadcast {
    origin: Uuid,
    bus: broadcast::Sender<Envelope>,
}

impl Default for ChannelBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelBroadcast {
    /// Open a new bus and return its first endpoint.
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel(BUS_CAPACITY);
        Self {
            origin: Uuid::new_v4(),
            bus,
        }
    }

    /// Another endpoint on the same bus.
    pub fn connect(&self) -> Self {
        Self {
            origin: Uuid::new_v4(),
            bus: self.bus.clone(),
        }
    }
}

impl LocalBroadcast for ChannelBroadcast {
    fn post(&self, event: &CacheEvent) {
        let _ = self.bus.send(Envelope {
            origin: self.origin,
            event: event.clone(),
        });
    }

    fn listen(&self) -> Subscription<CacheEvent> {
        let origin = self.origin;
        let mut bus = self.bus.subscribe();
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let task = tokio::spawn(async move {
            loop {
                let envelope = tokio::select! {
                    _ = tx.closed() => break,
                    received = bus.recv() => match received {
                        Ok(envelope) => envelope,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "local broadcast listener lagged");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                };
                if envelope.origin == origin {
                    continue;
                }
                if tx.send(envelope.event).await.is_err() {
                    break;
                }
            }
        });
        Subscription::new(rx, task)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredMessage {
    origin: Uuid,
    seq: u64,
    event: CacheEvent,
}

/// Endpoint that exchanges events through the local key-value store.
#[derive(Clone)]
pub struct StorageBroadcast {
    origin: Uuid,
    store: Arc<dyn LocalStore>,
    poll: Duration,
    seq: Arc<AtomicU64>,
}

impl StorageBroadcast {
    /// Endpoint polling `store` every `poll`.
    pub fn new(store: Arc<dyn LocalStore>, poll: Duration) -> Self {
        Self {
            origin: Uuid::new_v4(),
            store,
            poll,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }
}

fn read_message(store: &dyn LocalStore) -> Option<StoredMessage> {
    let raw = store.get(BROADCAST_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!(error = %err, "ignoring malformed broadcast entry");
            None
        }
    }
}

impl LocalBroadcast for StorageBroadcast {
    fn post(&self, event: &CacheEvent) {
        let message = StoredMessage {
            origin: self.origin,
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
            event: event.clone(),
        };
        match serde_json::to_string(&message) {
            Ok(encoded) => self.store.set(BROADCAST_KEY, encoded),
            Err(err) => warn!(error = %err, "failed to encode broadcast entry"),
        }
    }

    fn listen(&self) -> Subscription<CacheEvent> {
        let origin = self.origin;
        let store = self.store.clone();
        let poll = self.poll;
        let mut last_seen = read_message(store.as_ref()).map(|m| (m.origin, m.seq));
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }
                let reader = store.clone();
                let read = tokio::task::spawn_blocking(move || read_message(reader.as_ref()));
                let message = match read.await {
                    Ok(Some(message)) => message,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!(error = %err, "broadcast poll read failed");
                        continue;
                    }
                };
                let key = Some((message.origin, message.seq));
                if key == last_seen {
                    continue;
                }
                last_seen = key;
                if message.origin == origin {
                    continue;
                }
                if tx.send(message.event).await.is_err() {
                    break;
                }
            }
        });
        Subscription::new(rx, task)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;
    use crate::dao::local_store::MemoryLocalStore;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn channel_delivers_to_other_endpoints_only() {
        let first = ChannelBroadcast::new();
        let second = first.connect();
        let mut own = first.listen();
        let mut other = second.listen();

        first.post(&CacheEvent::Cleared);

        let received = timeout(WAIT, other.recv()).await.unwrap();
        assert_eq!(received, Some(CacheEvent::Cleared));
        assert!(
            timeout(Duration::from_millis(50), own.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn storage_transport_polls_the_store() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let writer = StorageBroadcast::new(store.clone(), Duration::from_millis(5));
        let reader = StorageBroadcast::new(store.clone(), Duration::from_millis(5));
        let mut feed = reader.listen();
        let mut own = writer.listen();

        writer.post(&CacheEvent::Reset);

        let received = timeout(WAIT, feed.recv()).await.unwrap();
        assert_eq!(received, Some(CacheEvent::Reset));
        assert!(
            timeout(Duration::from_millis(50), own.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn storage_listener_skips_entries_written_before_it_started() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let writer = StorageBroadcast::new(store.clone(), Duration::from_millis(5));
        writer.post(&CacheEvent::Cleared);

        let reader = StorageBroadcast::new(store, Duration::from_millis(5));
        let mut feed = reader.listen();
        assert!(
            timeout(Duration::from_millis(60), feed.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_transport_works_across_file_handles() {
        use crate::dao::local_store::FileLocalStore;

        let dir = std::env::temp_dir().join(format!("bookclub-poll-{}", Uuid::new_v4()));
        let path = dir.join("local.json");
        let writer = StorageBroadcast::new(
            Arc::new(FileLocalStore::open(&path)),
            Duration::from_millis(5),
        );
        let reader = StorageBroadcast::new(
            Arc::new(FileLocalStore::open(&path)),
            Duration::from_millis(5),
        );
        let mut feed = reader.listen();

        writer.post(&CacheEvent::Cleared);

        let received = timeout(WAIT, feed.recv()).await.unwrap();
        assert_eq!(received, Some(CacheEvent::Cleared));

        let _ = std::fs::remove_dir_all(dir);
    }
}
