//! Typed results for operations that may legitimately do nothing.

use serde::Serialize;
use utoipa::ToSchema;

/// Result of an operation that either took effect or was skipped for a known reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T = ()> {
    /// The operation took effect.
    Applied(T),
    /// The operation was a no-op.
    Skipped(Skip),
}

/// Why an operation was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Skip {
    /// No realtime backend is configured; the service runs in local-only mode.
    LocalOnly,
    /// Fewer than three candidates are loaded.
    InsufficientCandidates,
    /// The candidate feed failed to load.
    CandidatesUnavailable,
    /// Candidates are still loading; the spin will run once they arrive.
    SpinQueued,
    /// The reel index is out of range.
    NoSuchReel,
    /// The reel is not spinning.
    ReelNotSpinning,
    /// The reel is still spinning.
    ReelSpinning,
    /// Not every reel has stopped yet.
    SelectionIncomplete,
}

impl<T> Outcome<T> {
    /// Whether the operation took effect.
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    /// Reason for the no-op, if any.
    pub fn skipped(&self) -> Option<Skip> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Skipped(reason) => Some(*reason),
        }
    }

    /// Value carried by an applied outcome.
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Skipped(_) => None,
        }
    }

    /// Map the applied value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::Skipped(reason) => Outcome::Skipped(reason),
        }
    }
}
