//! In-process implementation of [`PollBackend`].
//!
//! Serves single-node deployments and tests. Every write publishes the touched path on a
//! broadcast channel; live feeds re-read their document or collection when it changes.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};

use crate::{
    dao::{
        models::{CollectionPath, DocPath, JsonMap, StoredDocument, merge_fields},
        poll_store::{CollectionFeed, DocumentFeed, PollBackend},
        storage::{StorageError, StorageResult},
    },
    subscription::{FEED_CAPACITY, Subscription},
};

const CHANGE_CAPACITY: usize = 64;

/// Failures raised by the in-memory store.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline.
    #[error("in-memory store is offline")]
    Offline,
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Shared in-memory document store.
#[derive(Clone)]
pub struct MemoryPollStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    documents: DashMap<DocPath, JsonMap>,
    changes: broadcast::Sender<DocPath>,
    signed_in: AtomicBool,
    offline: AtomicBool,
}

impl Default for MemoryPollStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPollStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                documents: DashMap::new(),
                changes,
                signed_in: AtomicBool::new(false),
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Whether an anonymous session was established.
    pub fn is_signed_in(&self) -> bool {
        self.inner.signed_in.load(Ordering::SeqCst)
    }

    /// Make every subsequent operation fail (or succeed again) to simulate an outage.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }
}

impl MemoryInner {
    fn ensure_online(&self) -> Result<(), MemoryStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(MemoryStoreError::Offline)
        } else {
            Ok(())
        }
    }

    fn read(&self, path: &DocPath) -> Option<JsonMap> {
        self.documents.get(path).map(|entry| entry.value().clone())
    }

    fn list(&self, path: &CollectionPath) -> Vec<StoredDocument> {
        let mut documents = self
            .documents
            .iter()
            .filter(|entry| path.contains(entry.key()))
            .map(|entry| StoredDocument {
                id: entry.key().id().to_string(),
                fields: entry.value().clone(),
            })
            .collect::<Vec<_>>();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        documents
    }

    fn notify(&self, path: DocPath) {
        let _ = self.changes.send(path);
    }
}

impl PollBackend for MemoryPollStore {
    fn sign_in_anonymously(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            inner.signed_in.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn get_document(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<JsonMap>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            Ok(inner.read(&path))
        })
    }

    fn merge_document(
        &self,
        path: DocPath,
        fields: JsonMap,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            merge_fields(inner.documents.entry(path.clone()).or_default().value_mut(), fields);
            inner.notify(path);
            Ok(())
        })
    }

    fn delete_document(&self, path: DocPath) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            if inner.documents.remove(&path).is_some() {
                inner.notify(path);
            }
            Ok(())
        })
    }

    fn list_collection(
        &self,
        path: CollectionPath,
    ) -> BoxFuture<'static, StorageResult<Vec<StoredDocument>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            Ok(inner.list(&path))
        })
    }

    fn delete_documents(&self, paths: Vec<DocPath>) -> BoxFuture<'static, StorageResult<usize>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            let mut removed = 0;
            for path in paths {
                if inner.documents.remove(&path).is_some() {
                    removed += 1;
                    inner.notify(path);
                }
            }
            Ok(removed)
        })
    }

    fn watch_document(&self, path: DocPath) -> DocumentFeed {
        let inner = self.inner.clone();
        let mut changes = inner.changes.subscribe();
        let (tx, rx) = mpsc::channel::<StorageResult<Option<JsonMap>>>(FEED_CAPACITY);
        let task = tokio::spawn(async move {
            let current = inner.ensure_online().map(|_| inner.read(&path));
            if tx.send(current.map_err(Into::into)).await.is_err() {
                return;
            }
            loop {
                let resend = tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok(changed) => changed == path,
                        Err(RecvError::Lagged(_)) => true,
                        Err(RecvError::Closed) => break,
                    },
                };
                if resend {
                    let current = inner.ensure_online().map(|_| inner.read(&path));
                    if tx.send(current.map_err(Into::into)).await.is_err() {
                        break;
                    }
                }
            }
        });
        Subscription::new(rx, task)
    }

    fn watch_collection(&self, path: CollectionPath) -> CollectionFeed {
        let inner = self.inner.clone();
        let mut changes = inner.changes.subscribe();
        let (tx, rx) = mpsc::channel::<StorageResult<Vec<StoredDocument>>>(FEED_CAPACITY);
        let task = tokio::spawn(async move {
            let current = inner.ensure_online().map(|_| inner.list(&path));
            if tx.send(current.map_err(Into::into)).await.is_err() {
                return;
            }
            loop {
                let resend = tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok(changed) => path.contains(&changed),
                        Err(RecvError::Lagged(_)) => true,
                        Err(RecvError::Closed) => break,
                    },
                };
                if resend {
                    let current = inner.ensure_online().map(|_| inner.list(&path));
                    if tx.send(current.map_err(Into::into)).await.is_err() {
                        break;
                    }
                }
            }
        });
        Subscription::new(rx, task)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ensure_online().map_err(Into::into) })
    }
}
