use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether a shared poll store is attached. Without one every poll operation is a
    /// local-only no-op.
    pub realtime: bool,
}

impl HealthResponse {
    /// The shared store answered.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            realtime: true,
        }
    }

    /// The shared store is missing or failing.
    pub fn degraded(realtime: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            realtime,
        }
    }
}
