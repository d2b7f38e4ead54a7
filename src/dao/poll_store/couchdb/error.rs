use reqwest::StatusCode;
use thiserror::Error;

/// Result of a CouchDB store call.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures raised by the CouchDB poll store.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A required environment variable is missing.
    #[error("`{var}` must be set to use the CouchDB poll store")]
    MissingEnvVar { var: &'static str },
    /// The HTTP client could not be created.
    #[error("could not build the CouchDB HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    /// The request never got an answer (connection refused, timeout, ...).
    #[error("CouchDB request to `{target}` failed")]
    Transport {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with a status the store does not handle.
    #[error("CouchDB answered {status} for `{target}`")]
    Status { target: String, status: StatusCode },
    /// A response body could not be decoded.
    #[error("CouchDB body for `{target}` is not the expected JSON")]
    Decode {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// A stored document could not be read back as a poll store document.
    #[error("stored document `{id}` has an unexpected shape")]
    Document {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    /// Every merge attempt lost a revision race.
    #[error("`{id}` kept changing underneath a merge ({attempts} attempts)")]
    Conflict { id: String, attempts: u32 },
}
