use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::poll::{
    PollChoice, PollSnapshot, Runoff, RunoffVoteRecord, Timestamp, VoteRecord, Winner,
};

/// Top-level fields of a stored document.
pub type JsonMap = serde_json::Map<String, Value>;

/// Address of a single document: alternating collection and document identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    segments: Vec<String>,
}

/// Address of a collection, either top-level or nested under a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl DocPath {
    /// Address a document inside a top-level collection.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            segments: vec![collection.into(), id.into()],
        }
    }

    /// Address a sub-collection of this document.
    pub fn collection(&self, name: impl Into<String>) -> CollectionPath {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        CollectionPath { segments }
    }

    /// Identifier of the document inside its collection.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Collection holding this document.
    pub fn parent(&self) -> CollectionPath {
        let mut segments = self.segments.clone();
        segments.pop();
        CollectionPath { segments }
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl CollectionPath {
    /// Address a top-level collection.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Address a document of this collection.
    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        let mut segments = self.segments.clone();
        segments.push(id.into());
        DocPath { segments }
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether `doc` is a direct child of this collection.
    pub fn contains(&self, doc: &DocPath) -> bool {
        doc.parent() == *self
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Document returned by collection listings.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Identifier inside the collection.
    pub id: String,
    /// Stored fields.
    pub fields: JsonMap,
}

/// Apply `patch` onto `target` with nested merge semantics.
///
/// Objects present on both sides are merged key by key; every other value (arrays,
/// scalars, `null`) replaces what was stored.
pub fn merge_fields(target: &mut JsonMap, patch: JsonMap) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_fields(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Serialize a patch struct into its top-level fields.
pub fn to_fields<T: Serialize>(value: &T) -> serde_json::Result<JsonMap> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = JsonMap::new();
            map.insert("value".into(), other);
            Ok(map)
        }
    }
}

/// Stored shape of the shared poll document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollDocumentEntity {
    pub poll_choices: Option<Vec<PollChoice>>,
    pub poll_published_at: Option<Timestamp>,
    pub winner: Option<Winner>,
    pub runoff: Option<Runoff>,
}

impl From<PollDocumentEntity> for PollSnapshot {
    fn from(value: PollDocumentEntity) -> Self {
        Self {
            poll_choices: value.poll_choices.unwrap_or_default(),
            poll_published_at: value.poll_published_at,
            winner: value.winner,
            runoff: value.runoff,
        }
    }
}

/// Stored shape of a primary-poll vote sub-document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteEntity {
    pub voter: String,
    pub books: Vec<String>,
    pub at: Option<Timestamp>,
}

impl From<VoteEntity> for VoteRecord {
    fn from(value: VoteEntity) -> Self {
        Self {
            voter: value.voter,
            books: value.books,
            at: value.at,
        }
    }
}

impl From<VoteRecord> for VoteEntity {
    fn from(value: VoteRecord) -> Self {
        Self {
            voter: value.voter,
            books: value.books,
            at: value.at,
        }
    }
}

/// Stored shape of a runoff vote sub-document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunoffVoteEntity {
    pub voter: String,
    pub book: String,
    pub at: Option<Timestamp>,
}

impl From<RunoffVoteEntity> for RunoffVoteRecord {
    fn from(value: RunoffVoteEntity) -> Self {
        Self {
            voter: value.voter,
            book: value.book,
            at: value.at,
        }
    }
}

impl From<RunoffVoteRecord> for RunoffVoteEntity {
    fn from(value: RunoffVoteRecord) -> Self {
        Self {
            voter: value.voter,
            book: value.book,
            at: value.at,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn nested_objects_are_merged() {
        let mut stored = map(json!({
            "pollChoices": [{"book": "A", "name": "x"}],
            "runoff": {"active": true, "choices": [{"book": "A"}], "endsAt": null}
        }));
        merge_fields(&mut stored, map(json!({"runoff": {"active": false}})));

        assert_eq!(stored["runoff"]["active"], json!(false));
        assert_eq!(stored["runoff"]["choices"], json!([{"book": "A"}]));
        assert_eq!(stored["pollChoices"], json!([{"book": "A", "name": "x"}]));
    }

    #[test]
    fn null_and_arrays_replace() {
        let mut stored = map(json!({"runoff": {"active": true}, "pollChoices": [1, 2]}));
        merge_fields(&mut stored, map(json!({"runoff": null, "pollChoices": []})));

        assert_eq!(stored["runoff"], Value::Null);
        assert_eq!(stored["pollChoices"], json!([]));
    }

    #[test]
    fn paths_render_and_nest() {
        let doc = DocPath::new("polls", "current");
        let votes = doc.collection("votes");
        let vote = votes.doc("alice");

        assert_eq!(vote.to_string(), "polls/current/votes/alice");
        assert_eq!(vote.id(), "alice");
        assert!(votes.contains(&vote));
        assert!(!votes.contains(&doc));
    }
}
