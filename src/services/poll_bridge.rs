//! Bridge between the poll lifecycle and the shared realtime document store.
//!
//! One document holds the published choices, the winner and the runoff; two
//! sub-collections hold one vote document per voter. Without a backend the bridge runs in
//! local-only mode and every operation is skipped with [`Skip::LocalOnly`].

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    dao::{
        models::{
            CollectionPath, DocPath, JsonMap, PollDocumentEntity, RunoffVoteEntity,
            StoredDocument, VoteEntity, to_fields,
        },
        poll_store::PollBackend,
        storage::{StorageError, StorageResult},
    },
    error::ServiceError,
    outcome::{Outcome, Skip},
    state::{
        aggregation::{CountByBook, NamesByBook, count_by_book, names_by_book, runoff_names_by_book},
        poll::{PollChoice, PollSnapshot, Runoff, RunoffVoteRecord, Timestamp, VoteRecord, Winner},
    },
    subscription::Subscription,
};

/// Sub-collection of primary-poll votes.
pub const VOTES_COLLECTION: &str = "votes";
/// Sub-collection of runoff votes.
pub const RUNOFF_VOTES_COLLECTION: &str = "runoffVotes";
/// Longest voter key written to the store.
pub const VOTER_KEY_MAX_LEN: usize = 64;

/// How many vote documents a purge removed; `None` when that purge failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PurgeReport {
    /// Primary-poll votes removed.
    pub votes: Option<usize>,
    /// Runoff votes removed.
    pub runoff_votes: Option<usize>,
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Published {
    /// Choices as written, after sanitation.
    pub choices: Vec<PollChoice>,
    /// Publication instant written to the document.
    #[schema(value_type = String, format = DateTime)]
    pub published_at: Timestamp,
    /// Vote purge results.
    pub purge: PurgeReport,
}

/// Handle over the shared poll document.
#[derive(Clone)]
pub struct PollBridge {
    backend: Option<Arc<dyn PollBackend>>,
    doc: DocPath,
}

/// Field set written with merge semantics.
struct Patch {
    fields: JsonMap,
    doc: String,
}

impl Patch {
    fn new(doc: &DocPath) -> Self {
        Self {
            fields: JsonMap::new(),
            doc: doc.to_string(),
        }
    }

    fn set(mut self, key: &str, value: &impl Serialize) -> StorageResult<Self> {
        let value =
            serde_json::to_value(value).map_err(|err| StorageError::malformed(&self.doc, err))?;
        self.fields.insert(key.to_string(), value);
        Ok(self)
    }

    fn null(mut self, key: &str) -> Self {
        self.fields.insert(key.to_string(), Value::Null);
        self
    }
}

impl PollBridge {
    /// Bridge writing to `doc` through `backend`.
    pub fn new(backend: Arc<dyn PollBackend>, doc: DocPath) -> Self {
        Self {
            backend: Some(backend),
            doc,
        }
    }

    /// Bridge without a backend.
    pub fn local_only(doc: DocPath) -> Self {
        Self { backend: None, doc }
    }

    /// Whether the bridge runs without a backend.
    pub fn is_local_only(&self) -> bool {
        self.backend.is_none()
    }

    /// Shared poll document.
    pub fn document(&self) -> &DocPath {
        &self.doc
    }

    /// Installed backend, if any.
    pub fn backend(&self) -> Option<&Arc<dyn PollBackend>> {
        self.backend.as_ref()
    }

    fn votes_path(&self) -> CollectionPath {
        self.doc.collection(VOTES_COLLECTION)
    }

    fn runoff_votes_path(&self) -> CollectionPath {
        self.doc.collection(RUNOFF_VOTES_COLLECTION)
    }

    /// Best-effort anonymous sign-in before a write.
    async fn ensure_auth(backend: &Arc<dyn PollBackend>) {
        if let Err(err) = backend.sign_in_anonymously().await {
            warn!(error = %err, "anonymous sign-in failed; attempting write anyway");
        }
    }

    async fn write_document(
        &self,
        backend: &Arc<dyn PollBackend>,
        operation: &'static str,
        patch: Patch,
    ) -> Result<(), ServiceError> {
        Self::ensure_auth(backend).await;
        backend
            .merge_document(self.doc.clone(), patch.fields)
            .await
            .map_err(|err| {
                warn!(operation, doc = %self.doc, error = %err, "poll document write failed");
                ServiceError::from(err)
            })
    }

    async fn purge(backend: &Arc<dyn PollBackend>, collection: CollectionPath) -> Option<usize> {
        let documents = match backend.list_collection(collection.clone()).await {
            Ok(documents) => documents,
            Err(err) => {
                warn!(collection = %collection, error = %err, "failed to list votes for purge");
                return None;
            }
        };
        if documents.is_empty() {
            return Some(0);
        }
        let paths = documents
            .iter()
            .map(|document| collection.doc(document.id.clone()))
            .collect();
        match backend.delete_documents(paths).await {
            Ok(removed) => {
                debug!(collection = %collection, removed, "purged votes");
                Some(removed)
            }
            Err(err) => {
                warn!(collection = %collection, error = %err, "failed to purge votes");
                None
            }
        }
    }

    async fn purge_votes(&self, backend: &Arc<dyn PollBackend>) -> PurgeReport {
        let (votes, runoff_votes) = tokio::join!(
            Self::purge(backend, self.votes_path()),
            Self::purge(backend, self.runoff_votes_path()),
        );
        PurgeReport {
            votes,
            runoff_votes,
        }
    }

    /// Publish a new poll and purge the votes of the previous one.
    pub async fn publish_poll(
        &self,
        choices: Vec<PollChoice>,
    ) -> Result<Outcome<Published>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let choices = sanitize_choices(choices);
        let published_at = Timestamp::now();
        let patch = Patch::new(&self.doc)
            .set("pollChoices", &choices)?
            .set("pollPublishedAt", &published_at)?
            .null("winner")
            .null("runoff");
        self.write_document(backend, "publish", patch).await?;
        let purge = self.purge_votes(backend).await;
        info!(count = choices.len(), "poll published");

        Ok(Outcome::Applied(Published {
            choices,
            published_at,
            purge,
        }))
    }

    /// Withdraw the poll, the winner and the runoff, and purge every vote.
    pub async fn clear_poll(&self) -> Result<Outcome<PurgeReport>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let patch = Patch::new(&self.doc)
            .set("pollChoices", &Vec::<PollChoice>::new())?
            .null("pollPublishedAt")
            .null("winner")
            .null("runoff");
        self.write_document(backend, "clear", patch).await?;
        let purge = self.purge_votes(backend).await;
        info!("poll cleared");
        Ok(Outcome::Applied(purge))
    }

    /// Store the terminal winner record. The published choices, the runoff and every vote
    /// are cleared in the process.
    pub async fn announce_winner(
        &self,
        book: &str,
        suggested_by: &str,
    ) -> Result<Outcome<Winner>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let book = book.trim();
        if book.is_empty() {
            return Err(ServiceError::InvalidInput("winner book must not be empty".into()));
        }
        let winner = Winner {
            book: book.to_string(),
            suggested_by: suggested_by.trim().to_string(),
            when: Some(Timestamp::now()),
        };
        let patch = Patch::new(&self.doc)
            .set("winner", &winner)?
            .set("pollChoices", &Vec::<PollChoice>::new())?
            .null("pollPublishedAt")
            .null("runoff");
        self.write_document(backend, "announce_winner", patch).await?;
        self.purge_votes(backend).await;
        info!(book = %winner.book, "winner announced");
        Ok(Outcome::Applied(winner))
    }

    /// Open a runoff between `choices`.
    pub async fn start_runoff(
        &self,
        choices: Vec<PollChoice>,
        ends_at: Option<Timestamp>,
        max_one: bool,
    ) -> Result<Outcome<Runoff>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let choices = sanitize_choices(choices);
        if choices.is_empty() {
            return Err(ServiceError::InvalidInput(
                "runoff needs at least one named book".into(),
            ));
        }
        let runoff = Runoff {
            active: true,
            choices,
            ends_at,
            max_one,
        };
        let patch = Patch::new(&self.doc).set("runoff", &runoff)?;
        self.write_document(backend, "start_runoff", patch).await?;
        info!(count = runoff.choices.len(), max_one, "runoff started");
        Ok(Outcome::Applied(runoff))
    }

    /// Close the runoff. Its choices and deadline stay on the document.
    pub async fn end_runoff(&self) -> Result<Outcome, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let mut runoff = JsonMap::new();
        runoff.insert("active".into(), Value::Bool(false));
        let patch = Patch::new(&self.doc).set("runoff", &runoff)?;
        self.write_document(backend, "end_runoff", patch).await?;
        info!("runoff ended");
        Ok(Outcome::Applied(()))
    }

    /// Replace `voter`'s primary-poll selection.
    pub async fn set_votes(
        &self,
        voter: &str,
        books: Vec<String>,
    ) -> Result<Outcome<VoteRecord>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let mut distinct: Vec<String> = Vec::new();
        for book in books.iter().map(|book| book.trim()).filter(|book| !book.is_empty()) {
            if !distinct.iter().any(|existing| existing == book) {
                distinct.push(book.to_string());
            }
        }
        let record = VoteRecord {
            voter: voter.trim().to_string(),
            books: distinct,
            at: Some(Timestamp::now()),
        };
        let path = self.votes_path().doc(voter_key(voter));
        let fields = to_fields(&VoteEntity::from(record.clone()))
            .map_err(|err| StorageError::malformed(&path, err))?;

        Self::ensure_auth(backend).await;
        backend
            .merge_document(path.clone(), fields)
            .await
            .map_err(|err| {
                warn!(doc = %path, error = %err, "vote write failed");
                ServiceError::from(err)
            })?;
        Ok(Outcome::Applied(record))
    }

    /// Replace `voter`'s runoff pick.
    pub async fn set_runoff_vote(
        &self,
        voter: &str,
        book: &str,
    ) -> Result<Outcome<RunoffVoteRecord>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let book = book.trim();
        if book.is_empty() {
            return Err(ServiceError::InvalidInput("runoff book must not be empty".into()));
        }
        let record = RunoffVoteRecord {
            voter: voter.trim().to_string(),
            book: book.to_string(),
            at: Some(Timestamp::now()),
        };
        let path = self.runoff_votes_path().doc(voter_key(voter));
        let fields = to_fields(&RunoffVoteEntity::from(record.clone()))
            .map_err(|err| StorageError::malformed(&path, err))?;

        Self::ensure_auth(backend).await;
        backend
            .merge_document(path.clone(), fields)
            .await
            .map_err(|err| {
                warn!(doc = %path, error = %err, "runoff vote write failed");
                ServiceError::from(err)
            })?;
        Ok(Outcome::Applied(record))
    }

    /// One-shot read of the poll document.
    pub async fn get_state(&self) -> Result<Outcome<PollSnapshot>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let fields = backend.get_document(self.doc.clone()).await.map_err(|err| {
            warn!(doc = %self.doc, error = %err, "poll document read failed");
            ServiceError::from(err)
        })?;
        Ok(Outcome::Applied(to_snapshot(&self.doc, fields)?))
    }

    /// Primary-poll voters grouped by book.
    pub async fn votes(&self) -> Result<Outcome<NamesByBook>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let documents = backend.list_collection(self.votes_path()).await?;
        Ok(Outcome::Applied(names_by_book(&vote_records(&documents))))
    }

    /// Runoff voters grouped by book.
    pub async fn runoff_votes(&self) -> Result<Outcome<NamesByBook>, ServiceError> {
        let Some(backend) = &self.backend else {
            return Ok(Outcome::Skipped(Skip::LocalOnly));
        };
        let documents = backend.list_collection(self.runoff_votes_path()).await?;
        Ok(Outcome::Applied(runoff_names_by_book(&runoff_vote_records(
            &documents,
        ))))
    }

    /// Primary-poll vote counts per book.
    pub async fn votes_summary(&self) -> Result<Outcome<CountByBook>, ServiceError> {
        Ok(self.votes().await?.map(|names| count_by_book(&names)))
    }

    /// Runoff vote counts per book.
    pub async fn runoff_votes_summary(&self) -> Result<Outcome<CountByBook>, ServiceError> {
        Ok(self.runoff_votes().await?.map(|names| count_by_book(&names)))
    }

    /// Live feed of normalized poll snapshots. Closed immediately in local-only mode.
    pub fn subscribe(&self) -> Subscription<PollSnapshot> {
        let Some(backend) = &self.backend else {
            return Subscription::closed();
        };
        let doc = self.doc.clone();
        backend
            .watch_document(doc.clone())
            .filter_map(move |update| match update.map(|fields| to_snapshot(&doc, fields)) {
                Ok(Ok(snapshot)) => Some(snapshot),
                Ok(Err(err)) | Err(err) => {
                    warn!(doc = %doc, error = %err, "skipping poll document update");
                    None
                }
            })
    }

    /// Live feed of primary-poll voters grouped by book.
    pub fn subscribe_votes(&self) -> Subscription<NamesByBook> {
        let Some(backend) = &self.backend else {
            return Subscription::closed();
        };
        backend
            .watch_collection(self.votes_path())
            .filter_map(|update| match update {
                Ok(documents) => Some(names_by_book(&vote_records(&documents))),
                Err(err) => {
                    warn!(error = %err, "skipping votes update");
                    None
                }
            })
    }

    /// Live feed of runoff voters grouped by book.
    pub fn subscribe_runoff_votes(&self) -> Subscription<NamesByBook> {
        let Some(backend) = &self.backend else {
            return Subscription::closed();
        };
        backend
            .watch_collection(self.runoff_votes_path())
            .filter_map(|update| match update {
                Ok(documents) => Some(runoff_names_by_book(&runoff_vote_records(&documents))),
                Err(err) => {
                    warn!(error = %err, "skipping runoff votes update");
                    None
                }
            })
    }
}

/// Store key for a voter: lowercase, runs outside `[a-z0-9._-]` collapsed to `_`, at most
/// [`VOTER_KEY_MAX_LEN`] characters, `anon_<millis>` when nothing is left.
pub fn voter_key(voter: &str) -> String {
    let mut key = String::new();
    let mut in_run = false;
    for ch in voter.trim().to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '_' | '-') {
            key.push(ch);
            in_run = false;
        } else if !in_run {
            key.push('_');
            in_run = true;
        }
    }
    key.truncate(VOTER_KEY_MAX_LEN);
    if key.is_empty() {
        format!("anon_{}", Timestamp::now().unix_millis())
    } else {
        key
    }
}

/// Trim every choice and drop those without a book.
pub fn sanitize_choices(choices: Vec<PollChoice>) -> Vec<PollChoice> {
    choices
        .into_iter()
        .filter_map(|choice| {
            let book = choice.book.trim();
            (!book.is_empty()).then(|| PollChoice {
                book: book.to_string(),
                name: choice.name.trim().to_string(),
            })
        })
        .collect()
}

fn to_snapshot(doc: &DocPath, fields: Option<JsonMap>) -> StorageResult<PollSnapshot> {
    let Some(fields) = fields else {
        return Ok(PollSnapshot::default());
    };
    serde_json::from_value::<PollDocumentEntity>(Value::Object(fields))
        .map(PollSnapshot::from)
        .map_err(|err| StorageError::malformed(doc, err))
}

fn vote_records(documents: &[StoredDocument]) -> Vec<VoteRecord> {
    documents
        .iter()
        .filter_map(|document| {
            match serde_json::from_value::<VoteEntity>(Value::Object(document.fields.clone())) {
                Ok(entity) => Some(VoteRecord::from(entity)),
                Err(err) => {
                    warn!(id = %document.id, error = %err, "skipping malformed vote");
                    None
                }
            }
        })
        .collect()
}

fn runoff_vote_records(documents: &[StoredDocument]) -> Vec<RunoffVoteRecord> {
    documents
        .iter()
        .filter_map(|document| {
            match serde_json::from_value::<RunoffVoteEntity>(Value::Object(
                document.fields.clone(),
            )) {
                Ok(entity) => Some(RunoffVoteRecord::from(entity)),
                Err(err) => {
                    warn!(id = %document.id, error = %err, "skipping malformed runoff vote");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::dao::poll_store::memory::MemoryPollStore;

    fn bridge() -> (PollBridge, MemoryPollStore) {
        let store = MemoryPollStore::new();
        let bridge = PollBridge::new(Arc::new(store.clone()), DocPath::new("polls", "current"));
        (bridge, store)
    }

    fn choice(book: &str, name: &str) -> PollChoice {
        PollChoice {
            book: book.into(),
            name: name.into(),
        }
    }

    async fn state(bridge: &PollBridge) -> PollSnapshot {
        bridge.get_state().await.unwrap().applied().unwrap()
    }

    #[tokio::test]
    async fn runoff_of_blank_books_is_rejected() {
        let (bridge, _) = bridge();
        let err = bridge
            .start_runoff(vec![choice("  ", "x"), choice("", "y")], None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(state(&bridge).await.runoff.is_none());
    }

    #[tokio::test]
    async fn missing_document_reads_as_empty_state() {
        let (bridge, _) = bridge();
        assert_eq!(state(&bridge).await, PollSnapshot::default());
    }

    #[tokio::test]
    async fn publish_sanitizes_and_purges_votes() {
        let (bridge, store) = bridge();
        let _ = bridge.set_votes("Alice", vec!["X".into()]).await.unwrap();
        let _ = bridge.set_runoff_vote("Bob", "X").await.unwrap();

        let published = bridge
            .publish_poll(vec![choice(" A ", "x"), choice("  ", "y"), choice("B", "z")])
            .await
            .unwrap()
            .applied()
            .unwrap();

        assert_eq!(published.choices, vec![choice("A", "x"), choice("B", "z")]);
        assert_eq!(
            published.purge,
            PurgeReport {
                votes: Some(1),
                runoff_votes: Some(1)
            }
        );
        assert!(bridge.votes().await.unwrap().applied().unwrap().is_empty());
        assert!(
            bridge
                .runoff_votes()
                .await
                .unwrap()
                .applied()
                .unwrap()
                .is_empty()
        );
        assert!(store.is_signed_in());

        let snapshot = state(&bridge).await;
        assert_eq!(snapshot.poll_choices.len(), 2);
        assert!(snapshot.poll_published_at.is_some());
        assert!(snapshot.winner.is_none());
    }

    #[tokio::test]
    async fn second_vote_replaces_first() {
        let (bridge, _) = bridge();
        let _ = bridge
            .set_votes("Alice", vec!["X".into(), "Y".into()])
            .await
            .unwrap();
        let _ = bridge.set_votes("alice", vec!["Z".into()]).await.unwrap();

        let names = bridge.votes().await.unwrap().applied().unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names["Z"], vec!["alice"]);

        let counts = bridge.votes_summary().await.unwrap().applied().unwrap();
        assert_eq!(counts["Z"], 1);
    }

    #[tokio::test]
    async fn end_runoff_keeps_choices_and_deadline() {
        let (bridge, _) = bridge();
        let ends_at = Timestamp::parse("2030-01-01T00:00:00Z").unwrap();
        let _ = bridge
            .start_runoff(vec![choice("A", ""), choice(" ", "")], Some(ends_at), true)
            .await
            .unwrap();
        let _ = bridge.end_runoff().await.unwrap();

        let runoff = state(&bridge).await.runoff.unwrap();
        assert!(!runoff.active);
        assert_eq!(runoff.choices, vec![choice("A", "")]);
        assert_eq!(runoff.ends_at, Some(ends_at));
        assert!(runoff.max_one);
    }

    #[tokio::test]
    async fn winner_clears_choices_and_runoff() {
        let (bridge, _) = bridge();
        let _ = bridge
            .publish_poll(vec![choice("Title X", "Alice"), choice("Y", "Bob")])
            .await
            .unwrap();
        let _ = bridge.start_runoff(vec![choice("Title X", "")], None, true).await;
        let _ = bridge.set_votes("carol", vec!["Y".into()]).await.unwrap();

        let winner = bridge
            .announce_winner("Title X", "Alice")
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(winner.suggested_by, "Alice");

        let snapshot = state(&bridge).await;
        assert_eq!(snapshot.winner.unwrap().book, "Title X");
        assert!(snapshot.poll_choices.is_empty());
        assert!(snapshot.runoff.is_none());
        assert!(bridge.votes().await.unwrap().applied().unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_only_mode_skips_everything() {
        let bridge = PollBridge::local_only(DocPath::new("polls", "current"));
        assert_eq!(
            bridge.publish_poll(vec![]).await.unwrap().skipped(),
            Some(Skip::LocalOnly)
        );
        assert_eq!(
            bridge.set_votes("a", vec![]).await.unwrap().skipped(),
            Some(Skip::LocalOnly)
        );
        assert_eq!(bridge.get_state().await.unwrap().skipped(), Some(Skip::LocalOnly));

        let mut feed = bridge.subscribe();
        assert_eq!(feed.recv().await, None);
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let (bridge, store) = bridge();
        store.set_offline(true);
        let err = bridge.clear_poll().await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn subscribe_follows_document() {
        let (bridge, _) = bridge();
        let mut feed = bridge.subscribe();
        let wait = Duration::from_secs(2);

        assert_eq!(
            timeout(wait, feed.recv()).await.unwrap(),
            Some(PollSnapshot::default())
        );
        let _ = bridge.publish_poll(vec![choice("A", "x")]).await.unwrap();
        let next = timeout(wait, feed.recv()).await.unwrap().unwrap();
        assert_eq!(next.poll_choices, vec![choice("A", "x")]);
    }

    #[tokio::test]
    async fn vote_feed_aggregates_by_book() {
        let (bridge, _) = bridge();
        let mut feed = bridge.subscribe_votes();
        let wait = Duration::from_secs(2);
        assert!(timeout(wait, feed.recv()).await.unwrap().unwrap().is_empty());

        let _ = bridge.set_votes("alice", vec!["X".into(), "Y".into()]).await;
        let _ = bridge.set_votes("bob", vec!["Y".into()]).await;

        let names = loop {
            let names = timeout(wait, feed.recv()).await.unwrap().unwrap();
            if names.get("Y").is_some_and(|voters| voters.len() == 2) {
                break names;
            }
        };
        assert_eq!(names["X"], vec!["alice"]);
        assert_eq!(names["Y"], vec!["alice", "bob"]);
    }

    #[test]
    fn voter_keys_are_normalized() {
        assert_eq!(voter_key("  Alice Smith "), "alice_smith");
        assert_eq!(voter_key("a!!b??c"), "a_b_c");
        assert_eq!(voter_key("Zoë.K-9"), "zo_.k-9");
        assert_eq!(voter_key(&"x".repeat(100)).len(), VOTER_KEY_MAX_LEN);
        assert!(voter_key("   ").starts_with("anon_"));
        assert!(voter_key("").starts_with("anon_"));
    }
}
