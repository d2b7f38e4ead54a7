use serde::Serialize;
use utoipa::ToSchema;

use crate::outcome::{Outcome, Skip};

/// Acknowledgement of an action that may have been skipped, carrying its result when
/// it took effect.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse<T> {
    /// Whether the action took effect.
    pub applied: bool,
    /// Why the action was a no-op.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<Skip>,
    /// What the action produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> From<Outcome<T>> for ActionResponse<T> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Outcome::Applied(result) => Self {
                applied: true,
                skipped_reason: None,
                result: Some(result),
            },
            Outcome::Skipped(reason) => Self {
                applied: false,
                skipped_reason: Some(reason),
                result: None,
            },
        }
    }
}

/// Acknowledgement of an action without a result.
#[derive(Debug, Serialize, ToSchema)]
pub struct AckResponse {
    /// Whether the action took effect.
    pub applied: bool,
    /// Why the action was a no-op.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<Skip>,
}

impl From<Outcome> for AckResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            applied: outcome.is_applied(),
            skipped_reason: outcome.skipped(),
        }
    }
}
