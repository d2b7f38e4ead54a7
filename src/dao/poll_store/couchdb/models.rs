use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{CollectionPath, DocPath, JsonMap};

/// Separator between path segments inside a CouchDB document id.
pub const PATH_SEPARATOR: &str = "::";
pub const END_SUFFIX: &str = "\u{ffff}";

/// Document id used for a logical path.
pub fn doc_id(path: &DocPath) -> String {
    path.segments().join(PATH_SEPARATOR)
}

/// Prefix shared by every direct child of a collection.
pub fn collection_prefix(path: &CollectionPath) -> String {
    let mut prefix = path.segments().join(PATH_SEPARATOR);
    prefix.push_str(PATH_SEPARATOR);
    prefix
}

/// Identifier of the child document if `id` sits directly under `prefix`.
pub fn child_id<'a>(prefix: &str, id: &'a str) -> Option<&'a str> {
    id.strip_prefix(prefix)
        .filter(|rest| !rest.is_empty() && !rest.contains(PATH_SEPARATOR))
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub value: Option<RowValue>,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RowValue {
    pub rev: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct KeysRequest<'a> {
    pub keys: &'a [String],
}

/// Stored document: CouchDB bookkeeping plus the user fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub fields: JsonMap,
}

impl CouchDocument {
    /// Strip CouchDB's underscore-prefixed keys.
    pub fn into_fields(mut self) -> JsonMap {
        self.fields.retain(|key, _| !key.starts_with('_'));
        self.fields
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<DeletedDocument>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDocsResult {
    #[serde(default)]
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
}

/// Render a `since` sequence the way CouchDB expects it in a query string.
pub fn seq_param(seq: &Value) -> String {
    match seq {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_logical_paths() {
        let doc = DocPath::new("polls", "current");
        let votes = doc.collection("votes");

        assert_eq!(doc_id(&doc), "polls::current");
        assert_eq!(doc_id(&votes.doc("alice")), "polls::current::votes::alice");
        assert_eq!(collection_prefix(&votes), "polls::current::votes::");
    }

    #[test]
    fn child_id_ignores_nested_documents() {
        let prefix = "polls::";
        assert_eq!(child_id(prefix, "polls::current"), Some("current"));
        assert_eq!(child_id(prefix, "polls::current::votes::alice"), None);
        assert_eq!(child_id(prefix, "other::current"), None);
    }

    #[test]
    fn bookkeeping_keys_are_stripped() {
        let doc: CouchDocument = serde_json::from_value(serde_json::json!({
            "_id": "polls::current",
            "_rev": "1-a",
            "pollChoices": []
        }))
        .unwrap();
        assert_eq!(doc.rev.as_deref(), Some("1-a"));
        let fields = doc.into_fields();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("pollChoices"));
    }
}
