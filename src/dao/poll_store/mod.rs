#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{CollectionPath, DocPath, JsonMap, StoredDocument},
        storage::StorageResult,
    },
    subscription::Subscription,
};

/// Item delivered by a document live feed: the current fields, or `None` if the document
/// does not exist.
pub type DocumentFeed = Subscription<StorageResult<Option<JsonMap>>>;
/// Item delivered by a collection live feed: every document currently in the collection.
pub type CollectionFeed = Subscription<StorageResult<Vec<StoredDocument>>>;

/// Capability surface of the shared realtime document store.
///
/// Handles are cheap to clone; every future is `'static` so callers can spawn them.
/// Live feeds deliver the current value first, then a fresh value after every change.
pub trait PollBackend: Send + Sync {
    /// Establish an anonymous session with the store.
    fn sign_in_anonymously(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Read a document.
    fn get_document(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<JsonMap>>>;
    /// Write `fields` onto a document with nested merge semantics, creating it if needed.
    fn merge_document(&self, path: DocPath, fields: JsonMap)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a document. Deleting a missing document succeeds.
    fn delete_document(&self, path: DocPath) -> BoxFuture<'static, StorageResult<()>>;
    /// List the documents of a collection, ordered by identifier.
    fn list_collection(
        &self,
        path: CollectionPath,
    ) -> BoxFuture<'static, StorageResult<Vec<StoredDocument>>>;
    /// Delete several documents in one batch, returning how many were removed.
    fn delete_documents(&self, paths: Vec<DocPath>) -> BoxFuture<'static, StorageResult<usize>>;
    /// Live feed over one document.
    fn watch_document(&self, path: DocPath) -> DocumentFeed;
    /// Live feed over one collection.
    fn watch_collection(&self, path: CollectionPath) -> CollectionFeed;
    /// Check that the store is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
