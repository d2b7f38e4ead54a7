use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{dao::storage::StorageError, services::candidates::CandidateError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The realtime backend rejected or failed an operation.
    #[error("realtime store unavailable")]
    Unavailable(#[from] StorageError),
    /// The candidate feed could not be loaded.
    #[error("candidate feed unavailable")]
    Candidates(#[from] CandidateError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors surfaced over HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was rejected.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// A dependency (realtime store, candidate feed) is unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Candidates(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failures_map_to_503() {
        let storage = StorageError::unavailable(
            "connection refused".into(),
            std::io::Error::other("refused"),
        );
        let response = AppError::from(ServiceError::from(storage)).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response =
            AppError::from(ServiceError::from(CandidateError::NotConfigured)).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn invalid_input_maps_to_400() {
        let response =
            AppError::from(ServiceError::InvalidInput("bad endsAt".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
