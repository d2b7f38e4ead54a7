use serde::Serialize;
use utoipa::ToSchema;

use crate::state::aggregation::{CountByBook, NamesByBook, count_by_book};

#[derive(Clone, Debug)]
/// Payload fanned out to every public SSE subscriber.
pub struct ServerEvent {
    /// SSE event name, `None` for unnamed messages.
    pub event: Option<String>,
    /// Raw data line.
    pub data: String,
}

impl ServerEvent {
    /// Event carrying a plain text payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize + ?Sized,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Votes grouped by book, sent on `poll.votes` and `poll.runoff_votes`.
pub struct VoteCountsEvent {
    /// Voter names per book, in first-vote order.
    #[schema(value_type = Object)]
    pub names: NamesByBook,
    /// Number of voters per book.
    #[schema(value_type = Object)]
    pub counts: CountByBook,
}

impl From<NamesByBook> for VoteCountsEvent {
    fn from(names: NamesByBook) -> Self {
        Self {
            counts: count_by_book(&names),
            names,
        }
    }
}
