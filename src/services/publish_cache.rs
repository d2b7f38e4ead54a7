//! Same-device mirror of what was last published, with change notifications.
//!
//! Values live in the [`LocalStore`] under fixed keys. Listeners in this process are
//! notified directly; other readers of the same store are reached through the configured
//! [`LocalBroadcast`] transport. The shared poll document stays the source of truth.

use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    dao::local_store::LocalStore,
    services::local_broadcast::LocalBroadcast,
    state::{
        poll::{Candidate, PollChoice, Timestamp, Winner},
        selection::PREVIEW_KEY,
    },
    subscription::{FEED_CAPACITY, Subscription},
};

/// Published choices.
pub const POLL_CHOICES_KEY: &str = "pollChoices";
/// When the choices were published.
pub const POLL_PUBLISHED_AT_KEY: &str = "pollPublishedAt";
/// Announced winner.
pub const POLL_WINNER_KEY: &str = "pollWinner";
/// Set when the publisher started a new session.
pub const POLL_RESET_KEY: &str = "pollReset";

const LOCAL_CAPACITY: usize = 32;

/// Change notification carried to cache listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    /// A poll was published.
    Published {
        /// Published choices.
        choices: Vec<PollChoice>,
        /// Publication instant.
        #[schema(value_type = String, format = DateTime)]
        published_at: Timestamp,
    },
    /// The published poll was withdrawn.
    Cleared,
    /// A winner was announced.
    WinnerAnnounced {
        /// The announced winner.
        winner: Winner,
    },
    /// A new session started.
    Reset,
}

/// Everything the cache currently holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    /// Published choices, empty when nothing is published.
    pub poll_choices: Vec<PollChoice>,
    /// When the choices were published.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub poll_published_at: Option<Timestamp>,
    /// Announced winner.
    pub winner: Option<Winner>,
    /// Whether a new session started since the last publish.
    pub reset: bool,
    /// Triple the selection machine landed on, if every reel stopped.
    pub preview: Option<Vec<Candidate>>,
}

/// Local publish cache.
#[derive(Clone)]
pub struct PublishCache {
    store: Arc<dyn LocalStore>,
    local: broadcast::Sender<CacheEvent>,
    remote: Arc<dyn LocalBroadcast>,
}

impl PublishCache {
    /// Cache over `store`, reaching other readers through `remote`.
    pub fn new(store: Arc<dyn LocalStore>, remote: Arc<dyn LocalBroadcast>) -> Self {
        let (local, _rx) = broadcast::channel(LOCAL_CAPACITY);
        Self {
            store,
            local,
            remote,
        }
    }

    /// Record a published poll.
    pub fn record_published(&self, choices: &[PollChoice], published_at: Timestamp) {
        self.write(POLL_CHOICES_KEY, &choices);
        self.write(POLL_PUBLISHED_AT_KEY, &published_at);
        self.store.remove(POLL_WINNER_KEY);
        self.store.remove(POLL_RESET_KEY);
        self.notify(CacheEvent::Published {
            choices: choices.to_vec(),
            published_at,
        });
    }

    /// Forget the published poll.
    pub fn clear_published(&self) {
        self.store.remove(POLL_CHOICES_KEY);
        self.store.remove(POLL_PUBLISHED_AT_KEY);
        self.notify(CacheEvent::Cleared);
    }

    /// Record the announced winner; the published choices are superseded.
    pub fn record_winner(&self, winner: &Winner) {
        self.write(POLL_WINNER_KEY, winner);
        self.store.remove(POLL_CHOICES_KEY);
        self.store.remove(POLL_PUBLISHED_AT_KEY);
        self.notify(CacheEvent::WinnerAnnounced {
            winner: winner.clone(),
        });
    }

    /// Mark the start of a new session.
    pub fn mark_reset(&self) {
        self.store.remove(POLL_CHOICES_KEY);
        self.store.remove(POLL_PUBLISHED_AT_KEY);
        self.store.remove(POLL_WINNER_KEY);
        self.write(POLL_RESET_KEY, &Timestamp::now());
        self.notify(CacheEvent::Reset);
    }

    /// Drop the published choices without notifying anyone. Used at boot.
    pub fn wipe_published(&self) {
        self.store.remove(POLL_CHOICES_KEY);
        self.store.remove(POLL_PUBLISHED_AT_KEY);
    }

    /// Current cache contents.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            poll_choices: self.read(POLL_CHOICES_KEY).unwrap_or_default(),
            poll_published_at: self.read(POLL_PUBLISHED_AT_KEY),
            winner: self.read(POLL_WINNER_KEY),
            reset: self.store.get(POLL_RESET_KEY).is_some(),
            preview: self.read(PREVIEW_KEY),
        }
    }

    /// Events from this process and from other readers, in arrival order.
    pub fn subscribe(&self) -> Subscription<CacheEvent> {
        let mut local = self.local.subscribe();
        let mut remote = self.remote.listen();
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let task = tokio::spawn(async move {
            let mut remote_open = true;
            loop {
                let event = tokio::select! {
                    _ = tx.closed() => break,
                    received = local.recv() => match received {
                        Ok(event) => event,
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    received = remote.recv(), if remote_open => match received {
                        Some(event) => event,
                        None => {
                            remote_open = false;
                            continue;
                        }
                    },
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Subscription::new(rx, task)
    }

    fn notify(&self, event: CacheEvent) {
        self.remote.post(&event);
        let _ = self.local.send(event);
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(encoded) => self.store.set(key, encoded),
            Err(err) => warn!(key, error = %err, "failed to encode publish cache entry"),
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding malformed publish cache entry");
                self.store.remove(key);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{dao::local_store::MemoryLocalStore, services::local_broadcast::ChannelBroadcast};

    fn choices() -> Vec<PollChoice> {
        ["A", "B", "C"]
            .into_iter()
            .map(|book| PollChoice {
                book: book.into(),
                name: "x".into(),
            })
            .collect()
    }

    fn cache() -> (PublishCache, Arc<dyn LocalStore>, ChannelBroadcast) {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let bus = ChannelBroadcast::new();
        let cache = PublishCache::new(store.clone(), Arc::new(bus.connect()));
        (cache, store, bus)
    }

    #[test]
    fn winner_supersedes_published_choices() {
        let (cache, _, _) = cache();
        cache.record_published(&choices(), Timestamp::now());
        assert_eq!(cache.snapshot().poll_choices.len(), 3);

        cache.record_winner(&Winner {
            book: "A".into(),
            suggested_by: "x".into(),
            when: Some(Timestamp::now()),
        });
        let snapshot = cache.snapshot();
        assert!(snapshot.poll_choices.is_empty());
        assert_eq!(snapshot.poll_published_at, None);
        assert_eq!(snapshot.winner.unwrap().book, "A");
    }

    #[test]
    fn reset_clears_everything_and_sets_flag() {
        let (cache, _, _) = cache();
        cache.record_published(&choices(), Timestamp::now());
        cache.mark_reset();

        let snapshot = cache.snapshot();
        assert!(snapshot.reset);
        assert!(snapshot.poll_choices.is_empty());
        assert!(snapshot.winner.is_none());
    }

    #[test]
    fn malformed_entries_are_discarded() {
        let (cache, store, _) = cache();
        store.set(POLL_CHOICES_KEY, "{oops".into());
        assert!(cache.snapshot().poll_choices.is_empty());
        assert_eq!(store.get(POLL_CHOICES_KEY), None);
    }

    #[tokio::test]
    async fn notifies_same_process_and_other_readers() {
        let (cache, _, bus) = cache();
        let mut same = cache.subscribe();
        let mut other = bus.listen();

        cache.clear_published();

        let wait = Duration::from_secs(2);
        assert_eq!(
            timeout(wait, same.recv()).await.unwrap(),
            Some(CacheEvent::Cleared)
        );
        assert_eq!(
            timeout(wait, other.recv()).await.unwrap(),
            Some(CacheEvent::Cleared)
        );
    }
}
