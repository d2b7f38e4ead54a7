//! Request payloads of the admin REST API.

use serde::Deserialize;
use serde_with::{BoolFromInt, DisplayFromStr, PickFirst, formats::Flexible, serde_as};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::{validate_not_blank, validate_rfc3339},
    error::ServiceError,
    state::poll::{PollChoice, Timestamp},
};

/// Longest runoff ballot accepted.
const MAX_RUNOFF_CHOICES: u64 = 20;

/// Winner announcement.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRequest {
    /// Winning title.
    #[validate(custom(function = "validate_not_blank"), length(max = 300))]
    pub book: String,
    /// Who suggested it.
    #[serde(default)]
    #[validate(length(max = 200))]
    pub suggested_by: String,
}

/// Runoff opening.
#[serde_as]
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RunoffRequest {
    /// Choices on the runoff ballot; blank books are dropped.
    #[validate(length(min = 1, max = MAX_RUNOFF_CHOICES))]
    pub choices: Vec<PollChoice>,
    /// Optional RFC 3339 deadline.
    #[serde(default)]
    #[validate(custom(function = "validate_rfc3339"))]
    pub ends_at: Option<String>,
    /// Single-pick ballot. Accepts booleans, integers and `"true"`/`"false"`.
    #[serde_as(as = "Option<PickFirst<(_, BoolFromInt<Flexible>, DisplayFromStr)>>")]
    #[schema(value_type = Option<bool>)]
    pub max_one: Option<bool>,
}

impl RunoffRequest {
    /// Parsed deadline.
    pub fn deadline(&self) -> Result<Option<Timestamp>, ServiceError> {
        self.ends_at
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                Timestamp::parse(value)
                    .map_err(|err| ServiceError::InvalidInput(format!("invalid endsAt: {err}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn runoff(body: serde_json::Value) -> RunoffRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn max_one_is_coerced_to_bool() {
        let choices = json!([{"book": "Dune", "name": "Ann"}]);
        assert_eq!(runoff(json!({"choices": choices, "maxOne": 1})).max_one, Some(true));
        assert_eq!(runoff(json!({"choices": choices, "maxOne": 0})).max_one, Some(false));
        assert_eq!(runoff(json!({"choices": choices, "maxOne": "true"})).max_one, Some(true));
        assert_eq!(runoff(json!({"choices": choices, "maxOne": true})).max_one, Some(true));
        assert_eq!(runoff(json!({"choices": choices})).max_one, None);
    }

    #[test]
    fn runoff_needs_choices_and_a_valid_deadline() {
        assert!(runoff(json!({"choices": []})).validate().is_err());

        let request = runoff(json!({
            "choices": [{"book": "Dune", "name": "Ann"}],
            "endsAt": "not a date"
        }));
        assert!(request.validate().is_err());

        let request = runoff(json!({
            "choices": [{"book": "Dune", "name": "Ann"}],
            "endsAt": "2030-01-01T00:00:00Z"
        }));
        assert!(request.validate().is_ok());
        assert!(request.deadline().unwrap().is_some());
    }

    #[test]
    fn winner_book_must_not_be_blank() {
        let request: WinnerRequest = serde_json::from_value(json!({"book": "  "})).unwrap();
        assert!(request.validate().is_err());
        let request: WinnerRequest =
            serde_json::from_value(json!({"book": "Dune", "suggestedBy": "Ann"})).unwrap();
        assert!(request.validate().is_ok());
    }
}
