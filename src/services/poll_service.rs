//! Poll lifecycle operations that touch both the shared document and the local cache.

use tracing::{info, warn};

use crate::{
    error::ServiceError,
    outcome::{Outcome, Skip},
    services::poll_bridge::PurgeReport,
    state::{
        SharedState,
        aggregation::{CountByBook, NamesByBook},
        poll::{PollChoice, PollSnapshot, Runoff, RunoffVoteRecord, Timestamp, VoteRecord, Winner},
    },
};

/// Withdraw the published poll everywhere.
pub async fn clear_poll(state: &SharedState) -> Result<Outcome<PurgeReport>, ServiceError> {
    let outcome = state.bridge().clear_poll().await?;
    state.cache().clear_published();
    Ok(outcome)
}

/// Announce the winner. The local cache records it even in local-only mode.
pub async fn announce_winner(
    state: &SharedState,
    book: &str,
    suggested_by: &str,
) -> Result<Outcome<Winner>, ServiceError> {
    let outcome = state.bridge().announce_winner(book, suggested_by).await?;
    match &outcome {
        Outcome::Applied(winner) => state.cache().record_winner(winner),
        Outcome::Skipped(Skip::LocalOnly) => state.cache().record_winner(&Winner {
            book: book.trim().to_string(),
            suggested_by: suggested_by.trim().to_string(),
            when: Some(Timestamp::now()),
        }),
        Outcome::Skipped(_) => {}
    }
    Ok(outcome)
}

/// Open a runoff.
pub async fn start_runoff(
    state: &SharedState,
    choices: Vec<PollChoice>,
    ends_at: Option<Timestamp>,
    max_one: bool,
) -> Result<Outcome<Runoff>, ServiceError> {
    if let Some(deadline) = &ends_at {
        if deadline.unix_millis() <= Timestamp::now().unix_millis() {
            warn!(ends_at = %deadline, "runoff deadline already passed");
        }
    }
    state.bridge().start_runoff(choices, ends_at, max_one).await
}

/// Close the runoff.
pub async fn end_runoff(state: &SharedState) -> Result<Outcome, ServiceError> {
    state.bridge().end_runoff().await
}

/// Start a new session: withdraw the poll, flag the reset for local readers and return
/// the reels to idle. The local steps run even if the shared store fails.
pub async fn new_session(state: &SharedState) -> Result<Outcome<PurgeReport>, ServiceError> {
    let outcome = state.bridge().clear_poll().await;
    state.cache().mark_reset();
    state.selection().reset().await;
    info!(shared = outcome.is_ok(), "new session started");
    outcome
}

/// Current shared poll state.
pub async fn get_state(state: &SharedState) -> Result<Outcome<PollSnapshot>, ServiceError> {
    state.bridge().get_state().await
}

/// Replace a voter's primary-poll selection.
pub async fn set_votes(
    state: &SharedState,
    voter: &str,
    books: Vec<String>,
) -> Result<Outcome<VoteRecord>, ServiceError> {
    state.bridge().set_votes(voter, books).await
}

/// Replace a voter's runoff pick.
pub async fn set_runoff_vote(
    state: &SharedState,
    voter: &str,
    book: &str,
) -> Result<Outcome<RunoffVoteRecord>, ServiceError> {
    state.bridge().set_runoff_vote(voter, book).await
}

/// Primary-poll voters per book.
pub async fn votes(state: &SharedState) -> Result<Outcome<NamesByBook>, ServiceError> {
    state.bridge().votes().await
}

/// Primary-poll counts per book.
pub async fn votes_summary(state: &SharedState) -> Result<Outcome<CountByBook>, ServiceError> {
    state.bridge().votes_summary().await
}

/// Runoff voters per book.
pub async fn runoff_votes(state: &SharedState) -> Result<Outcome<NamesByBook>, ServiceError> {
    state.bridge().runoff_votes().await
}

/// Runoff counts per book.
pub async fn runoff_votes_summary(
    state: &SharedState,
) -> Result<Outcome<CountByBook>, ServiceError> {
    state.bridge().runoff_votes_summary().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    fn choice(book: &str) -> PollChoice {
        PollChoice {
            book: book.into(),
            name: "club".into(),
        }
    }

    #[tokio::test]
    async fn winner_is_recorded_locally_and_shared() {
        let state = AppState::in_memory(AppConfig::default());
        state
            .bridge()
            .publish_poll(vec![choice("A"), choice("B"), choice("C")])
            .await
            .unwrap();

        let winner = announce_winner(&state, " B ", "Ann")
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(winner.book, "B");

        let cached = state.cache().snapshot();
        assert_eq!(cached.winner.unwrap().book, "B");
        assert!(cached.poll_choices.is_empty());

        let shared = get_state(&state).await.unwrap().applied().unwrap();
        assert_eq!(shared.winner.unwrap().suggested_by, "Ann");
        assert!(shared.poll_choices.is_empty());
        assert!(shared.runoff.is_none());
    }

    #[tokio::test]
    async fn new_session_purges_votes_and_flags_reset() {
        let state = AppState::in_memory(AppConfig::default());
        state
            .bridge()
            .publish_poll(vec![choice("A"), choice("B"), choice("C")])
            .await
            .unwrap();
        set_votes(&state, "Ann", vec!["A".into()]).await.unwrap();
        set_runoff_vote(&state, "Bob", "B").await.unwrap();

        let report = new_session(&state).await.unwrap().applied().unwrap();
        assert_eq!(report.votes, Some(1));
        assert_eq!(report.runoff_votes, Some(1));
        assert!(state.cache().snapshot().reset);
        assert!(votes(&state).await.unwrap().applied().unwrap().is_empty());
    }

    #[tokio::test]
    async fn runoff_can_be_opened_and_closed() {
        let state = AppState::in_memory(AppConfig::default());
        let runoff = start_runoff(&state, vec![choice("A"), choice(" ")], None, true)
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(runoff.choices, vec![choice("A")]);

        assert!(end_runoff(&state).await.unwrap().is_applied());
        let shared = get_state(&state).await.unwrap().applied().unwrap();
        let runoff = shared.runoff.unwrap();
        assert!(!runoff.active);
        assert_eq!(runoff.choices.len(), 1);
        assert!(runoff.max_one);
    }

    #[tokio::test]
    async fn summaries_count_voters() {
        let state = AppState::in_memory(AppConfig::default());
        set_votes(&state, "alice", vec!["X".into(), "Y".into()]).await.unwrap();
        set_votes(&state, "bob", vec!["Y".into()]).await.unwrap();

        let counts = votes_summary(&state).await.unwrap().applied().unwrap();
        assert_eq!(counts.get("X"), Some(&1));
        assert_eq!(counts.get("Y"), Some(&2));
        assert!(runoff_votes_summary(&state).await.unwrap().applied().unwrap().is_empty());
    }
}
