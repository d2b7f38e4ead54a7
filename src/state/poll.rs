use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use utoipa::ToSchema;

/// Candidate book loaded from the submissions feed.
///
/// Candidates are addressed by their position in the feed; the same index is assumed
/// to designate the same book across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Book title as typed in the submission.
    pub title: String,
    /// Display name of the member who suggested it.
    pub suggested_by: String,
}

impl Candidate {
    /// Build a candidate, trimming both fields.
    pub fn new(title: impl AsRef<str>, suggested_by: impl AsRef<str>) -> Self {
        Self {
            title: title.as_ref().trim().to_string(),
            suggested_by: suggested_by.as_ref().trim().to_string(),
        }
    }
}

/// One entry of a published poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PollChoice {
    /// Book title.
    pub book: String,
    /// Member who suggested the book.
    #[serde(default)]
    pub name: String,
}

impl From<&Candidate> for PollChoice {
    fn from(value: &Candidate) -> Self {
        Self {
            book: value.title.clone(),
            name: value.suggested_by.clone(),
        }
    }
}

/// Terminal record stored once the publisher announces the chosen book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    /// Winning book title.
    pub book: String,
    /// Member who suggested the winning book.
    #[serde(default)]
    pub suggested_by: String,
    /// When the winner was announced.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub when: Option<Timestamp>,
}

/// Secondary single-round vote among a subset of books.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Runoff {
    /// Whether voters may currently cast runoff votes.
    pub active: bool,
    /// Books competing in the runoff.
    pub choices: Vec<PollChoice>,
    /// Optional deadline displayed to voters.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub ends_at: Option<Timestamp>,
    /// Whether a voter may pick only one book.
    pub max_one: bool,
}

/// Normalized view of the shared poll document.
///
/// Missing fields default to empty/null, so a document that does not exist yet reads as
/// the empty state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PollSnapshot {
    /// Published triple, empty when no poll is live.
    pub poll_choices: Vec<PollChoice>,
    /// When the current triple was published.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub poll_published_at: Option<Timestamp>,
    /// Announced winner, if any.
    pub winner: Option<Winner>,
    /// Runoff round, if one was started.
    pub runoff: Option<Runoff>,
}

impl PollSnapshot {
    /// Whether voters currently have a primary poll to vote on.
    pub fn is_live(&self) -> bool {
        !self.poll_choices.is_empty() && self.winner.is_none()
    }
}

/// A voter's current selection in the primary poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteRecord {
    /// Display name as typed by the voter.
    pub voter: String,
    /// Books the voter selected.
    pub books: Vec<String>,
    /// When the selection was last written.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub at: Option<Timestamp>,
}

/// A voter's single pick in the runoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunoffVoteRecord {
    /// Display name as typed by the voter.
    pub voter: String,
    /// Selected book.
    pub book: String,
    /// When the pick was last written.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub at: Option<Timestamp>,
}

/// UTC instant serialized as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Current instant.
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Milliseconds since the Unix epoch.
    pub fn unix_millis(&self) -> i128 {
        self.0.unix_timestamp_nanos() / 1_000_000
    }

    /// Parse an RFC 3339 string.
    pub fn parse(value: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(value, &Rfc3339).map(Self)
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.format(&Rfc3339) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Timestamp::parse(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_defaults_missing_fields() {
        let snapshot: PollSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, PollSnapshot::default());
        assert!(!snapshot.is_live());
    }

    #[test]
    fn runoff_accepts_partial_document() {
        let runoff: Runoff = serde_json::from_str(r#"{"active":false}"#).unwrap();
        assert!(!runoff.active);
        assert!(runoff.choices.is_empty());
        assert_eq!(runoff.ends_at, None);
    }

    #[test]
    fn timestamp_round_trips_as_rfc3339() {
        let parsed = Timestamp::parse("2024-05-01T18:30:00Z").unwrap();
        assert_eq!(parsed.to_string(), "2024-05-01T18:30:00Z");
        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, "\"2024-05-01T18:30:00Z\"");
    }
}
