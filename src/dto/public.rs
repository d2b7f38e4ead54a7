use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_not_blank,
    outcome::Outcome,
    state::{
        aggregation::{CountByBook, NamesByBook},
        poll::PollSnapshot,
    },
};

/// A voter's full primary-poll selection.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VotesRequest {
    /// Display name; blank names get an anonymous key.
    #[serde(default)]
    #[validate(length(max = 200))]
    pub voter: String,
    /// Selected books. Blank and repeated entries are ignored.
    #[validate(length(max = 50))]
    pub books: Vec<String>,
}

/// A voter's runoff pick.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RunoffVoteRequest {
    /// Display name; blank names get an anonymous key.
    #[serde(default)]
    #[validate(length(max = 200))]
    pub voter: String,
    /// Picked book.
    #[validate(custom(function = "validate_not_blank"))]
    pub book: String,
}

/// Shared poll state as seen by voters.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollStateResponse {
    /// No shared store is attached; the state is empty.
    pub local_only: bool,
    /// Normalized document.
    #[serde(flatten)]
    pub state: PollSnapshot,
}

impl From<Outcome<PollSnapshot>> for PollStateResponse {
    fn from(outcome: Outcome<PollSnapshot>) -> Self {
        let local_only = !outcome.is_applied();
        Self {
            local_only,
            state: outcome.applied().unwrap_or_default(),
        }
    }
}

/// Voters grouped by book.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VotesResponse {
    /// No shared store is attached; the mapping is empty.
    pub local_only: bool,
    /// Voter names per book, in first-vote order.
    #[schema(value_type = Object)]
    pub names: NamesByBook,
}

impl From<Outcome<NamesByBook>> for VotesResponse {
    fn from(outcome: Outcome<NamesByBook>) -> Self {
        Self {
            local_only: !outcome.is_applied(),
            names: outcome.applied().unwrap_or_default(),
        }
    }
}

/// Vote counts per book.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VotesSummaryResponse {
    /// No shared store is attached; the counts are empty.
    pub local_only: bool,
    /// Voters per book.
    #[schema(value_type = Object)]
    pub counts: CountByBook,
}

impl From<Outcome<CountByBook>> for VotesSummaryResponse {
    fn from(outcome: Outcome<CountByBook>) -> Self {
        Self {
            local_only: !outcome.is_applied(),
            counts: outcome.applied().unwrap_or_default(),
        }
    }
}
