use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    dao::{
        models::{CollectionPath, DocPath, JsonMap, StoredDocument, merge_fields},
        poll_store::{CollectionFeed, DocumentFeed, PollBackend},
        storage::StorageResult,
    },
    subscription::{FEED_CAPACITY, Subscription},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, BulkDocsRequest, BulkDocsResult, ChangesResponse, CouchDocument,
        DeletedDocument, END_SUFFIX, KeysRequest, child_id, collection_prefix, doc_id, seq_param,
    },
};

const MERGE_ATTEMPTS: u32 = 3;
const FEED_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct CouchPollStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    changes_timeout: Duration,
}

impl CouchPollStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::Client { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            changes_timeout: config.changes_timeout,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                target: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Transport {
                        target: database.clone(),
                        source,
                    })?;
                // 412 means another process created it first.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::Status {
                        target: database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::Status {
                target: database,
                status: other,
            }),
        }
    }

    async fn send_json<T>(
        &self,
        builder: reqwest::RequestBuilder,
        path: &str,
    ) -> CouchResult<T>
    where
        T: DeserializeOwned,
    {
        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                target: path.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::Status {
                target: path.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::Decode {
                target: path.to_string(),
                source,
            })
    }

    async fn fetch(&self, doc_id: &str) -> CouchResult<Option<CouchDocument>> {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                target: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchDocument>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::Decode {
                    target: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::Status {
                target: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Write a full document. Returns `false` when CouchDB reports a revision conflict.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<bool>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                target: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::Status {
                target: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn merge(&self, path: &DocPath, patch: JsonMap) -> CouchResult<()> {
        let id = doc_id(path);
        for attempt in 1..=MERGE_ATTEMPTS {
            let mut document = self.fetch(&id).await?.unwrap_or_else(|| CouchDocument {
                id: id.clone(),
                rev: None,
                fields: JsonMap::new(),
            });
            merge_fields(&mut document.fields, patch.clone());
            if self.put_document(&id, &document).await? {
                return Ok(());
            }
            debug!(doc = %id, attempt, "merge hit a revision conflict; retrying");
        }
        Err(CouchDaoError::Conflict {
            id,
            attempts: MERGE_ATTEMPTS,
        })
    }

    async fn list_documents(&self, path: &CollectionPath) -> CouchResult<Vec<StoredDocument>> {
        const ALL_DOCS: &str = "_all_docs";
        let prefix = collection_prefix(path);
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let payload: AllDocsResponse = self
            .send_json(self.request(Method::GET, ALL_DOCS).query(&query), ALL_DOCS)
            .await?;

        let mut documents = Vec::new();
        for row in payload.rows {
            let (Some(id), Some(doc)) = (row.id, row.doc) else {
                continue;
            };
            let Some(child) = child_id(&prefix, &id) else {
                continue;
            };
            let parsed: CouchDocument =
                from_value(doc).map_err(|source| CouchDaoError::Document {
                    id: id.clone(),
                    source,
                })?;
            documents.push(StoredDocument {
                id: child.to_string(),
                fields: parsed.into_fields(),
            });
        }
        // `_all_docs` is ordered by full id, which already sorts children by their own id.
        Ok(documents)
    }

    async fn bulk_delete(&self, paths: &[DocPath]) -> CouchResult<usize> {
        const ALL_DOCS: &str = "_all_docs";
        const BULK_DOCS: &str = "_bulk_docs";
        if paths.is_empty() {
            return Ok(0);
        }

        let keys = paths.iter().map(doc_id).collect::<Vec<_>>();
        let revisions: AllDocsResponse = self
            .send_json(
                self.request(Method::POST, ALL_DOCS)
                    .json(&KeysRequest { keys: &keys }),
                ALL_DOCS,
            )
            .await?;

        let docs = revisions
            .rows
            .into_iter()
            .filter_map(|row| match (row.id, row.value) {
                (Some(id), Some(value)) if !value.deleted => Some(DeletedDocument {
                    id,
                    rev: value.rev,
                    deleted: true,
                }),
                _ => None,
            })
            .collect::<Vec<_>>();
        if docs.is_empty() {
            return Ok(0);
        }

        let results: Vec<BulkDocsResult> = self
            .send_json(
                self.request(Method::POST, BULK_DOCS)
                    .json(&BulkDocsRequest { docs }),
                BULK_DOCS,
            )
            .await?;
        Ok(results.iter().filter(|result| result.ok).count())
    }

    async fn current_seq(&self) -> CouchResult<Value> {
        const CHANGES: &str = "_changes";
        let payload: ChangesResponse = self
            .send_json(
                self.request(Method::GET, CHANGES)
                    .query(&[("since", "now"), ("limit", "0")]),
                CHANGES,
            )
            .await?;
        Ok(payload.last_seq)
    }

    async fn wait_for_changes(&self, since: &Value) -> CouchResult<(Vec<String>, Value)> {
        const CHANGES: &str = "_changes";
        let timeout_ms = self.changes_timeout.as_millis().to_string();
        let query = [
            ("feed", "longpoll".to_string()),
            ("since", seq_param(since)),
            ("timeout", timeout_ms),
        ];
        let payload: ChangesResponse = self
            .send_json(self.request(Method::GET, CHANGES).query(&query), CHANGES)
            .await?;
        let ids = payload.results.into_iter().map(|row| row.id).collect();
        Ok((ids, payload.last_seq))
    }

    /// Drive a live feed: send the first read, then re-read whenever `relevant` matches a
    /// changed document id. Errors are delivered to the consumer and retried after a pause.
    fn spawn_feed<T, R, F>(&self, relevant: F, read: R) -> Subscription<StorageResult<T>>
    where
        T: Send + 'static,
        R: Fn(CouchPollStore) -> BoxFuture<'static, CouchResult<T>> + Send + 'static,
        F: Fn(&str) -> bool + Send + 'static,
    {
        let store = self.clone();
        let (tx, rx) = mpsc::channel::<StorageResult<T>>(FEED_CAPACITY);
        let task = tokio::spawn(async move {
            let mut since: Option<Value> = None;
            let mut stale = true;
            loop {
                if tx.is_closed() {
                    break;
                }
                if since.is_none() {
                    match store.current_seq().await {
                        Ok(seq) => since = Some(seq),
                        Err(err) => {
                            warn!(error = %err, "CouchDB change feed unavailable");
                            if tx.send(Err(err.into())).await.is_err() {
                                break;
                            }
                            tokio::time::sleep(FEED_RETRY_DELAY).await;
                            continue;
                        }
                    }
                }
                if stale {
                    let current = read(store.clone()).await.map_err(Into::into);
                    if tx.send(current).await.is_err() {
                        break;
                    }
                    stale = false;
                }
                let Some(seq) = since.clone() else {
                    continue;
                };
                let changes = tokio::select! {
                    _ = tx.closed() => break,
                    changes = store.wait_for_changes(&seq) => changes,
                };
                match changes {
                    Ok((ids, last_seq)) => {
                        stale = ids.iter().any(|id| relevant(id.as_str()));
                        since = Some(last_seq);
                    }
                    Err(err) => {
                        warn!(error = %err, "CouchDB change feed interrupted");
                        if tx.send(Err(err.into())).await.is_err() {
                            break;
                        }
                        tokio::time::sleep(FEED_RETRY_DELAY).await;
                        since = None;
                        stale = true;
                    }
                }
            }
        });
        Subscription::new(rx, task)
    }
}

impl PollBackend for CouchPollStore {
    fn sign_in_anonymously(&self) -> BoxFuture<'static, StorageResult<()>> {
        // CouchDB has no anonymous accounts; reaching the database is the session.
        self.health_check()
    }

    fn get_document(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<JsonMap>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.fetch(&doc_id(&path)).await?;
            Ok(document.map(CouchDocument::into_fields))
        })
    }

    fn merge_document(
        &self,
        path: DocPath,
        fields: JsonMap,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.merge(&path, fields).await.map_err(Into::into) })
    }

    fn delete_document(&self, path: DocPath) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.bulk_delete(&[path]).await?;
            Ok(())
        })
    }

    fn list_collection(
        &self,
        path: CollectionPath,
    ) -> BoxFuture<'static, StorageResult<Vec<StoredDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.list_documents(&path).await.map_err(Into::into) })
    }

    fn delete_documents(&self, paths: Vec<DocPath>) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move { store.bulk_delete(&paths).await.map_err(Into::into) })
    }

    fn watch_document(&self, path: DocPath) -> DocumentFeed {
        let id = doc_id(&path);
        let watched = id.clone();
        self.spawn_feed(
            move |changed| changed == watched,
            move |store| {
                let id = id.clone();
                Box::pin(async move {
                    let document = store.fetch(&id).await?;
                    Ok(document.map(CouchDocument::into_fields))
                })
            },
        )
    }

    fn watch_collection(&self, path: CollectionPath) -> CollectionFeed {
        let prefix = collection_prefix(&path);
        self.spawn_feed(
            move |changed| child_id(&prefix, changed).is_some(),
            move |store| {
                let path = path.clone();
                Box::pin(async move { store.list_documents(&path).await })
            },
        )
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::Transport {
                    target: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::Status {
                    target: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }
}
