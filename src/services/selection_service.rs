use tracing::{info, warn};

use crate::{
    error::ServiceError,
    outcome::{Outcome, Skip},
    services::{candidates, poll_bridge::Published},
    state::{
        SharedState,
        poll::{Candidate, PollChoice, Timestamp},
        selection::{SelectionChange, SelectionSnapshot},
    },
};

/// Current view of the reels.
pub async fn snapshot(state: &SharedState) -> SelectionSnapshot {
    state.selection().snapshot().await
}

/// Re-run the candidate feed load and hand the result to the selection machine.
///
/// The machine is updated even when the feed fails (it switches to its error state); the
/// failure is still reported to the caller.
pub async fn reload_candidates(
    state: &SharedState,
) -> Result<Outcome<SelectionChange>, ServiceError> {
    let loaded =
        candidates::load_candidates(state.http(), state.config().candidates_url.as_deref()).await;

    let (handoff, failure) = match loaded {
        Ok(list) => (Ok(list), None),
        Err(err) => {
            warn!(error = %err, "candidate feed load failed");
            (Err(err.to_string()), Some(err))
        }
    };

    let outcome = state.selection().load_candidates(handoff).await;
    if let Some(err) = failure {
        return Err(err.into());
    }
    Ok(settle(state, outcome).await)
}

/// Spin every reel.
pub async fn spin(state: &SharedState) -> Outcome<SelectionChange> {
    let outcome = state.selection().start_spin().await;
    settle(state, outcome).await
}

/// Stop one reel.
pub async fn stop_reel(state: &SharedState, reel: usize) -> Outcome<SelectionChange> {
    let outcome = state.selection().stop_reel(reel).await;
    if let Outcome::Applied(SelectionChange { ready: true, .. }) = &outcome {
        info!("all reels stopped; selection ready to publish");
    }
    settle(state, outcome).await
}

/// Respin one stopped reel.
pub async fn respin_reel(state: &SharedState, reel: usize) -> Outcome<SelectionChange> {
    let outcome = state.selection().respin_reel(reel).await;
    settle(state, outcome).await
}

/// Return every reel to idle.
pub async fn reset(state: &SharedState) -> Outcome<SelectionChange> {
    let outcome = state.selection().reset().await;
    settle(state, outcome).await
}

/// Publish the landed triple as the poll choices.
///
/// In local-only mode the choices are still mirrored into the publish cache so readers
/// of this deployment see them.
pub async fn publish(state: &SharedState) -> Result<Outcome<Published>, ServiceError> {
    let Some(preview) = state.selection().preview().await else {
        return Ok(Outcome::Skipped(Skip::SelectionIncomplete));
    };
    let choices: Vec<PollChoice> = preview.iter().map(PollChoice::from).collect();

    let outcome = state.bridge().publish_poll(choices.clone()).await?;
    confirm_published(state, &preview, choices, outcome).await
}

/// Record a finished publish write, unless the reels moved while it was in flight. In
/// that case the write is withdrawn again.
async fn confirm_published(
    state: &SharedState,
    preview: &[Candidate],
    choices: Vec<PollChoice>,
    outcome: Outcome<Published>,
) -> Result<Outcome<Published>, ServiceError> {
    if state.selection().preview().await.as_deref() != Some(preview) {
        warn!("reels moved during publish; withdrawing the stale poll");
        if outcome.is_applied() {
            state.bridge().clear_poll().await?;
        }
        return Ok(Outcome::Skipped(Skip::SelectionIncomplete));
    }

    match &outcome {
        Outcome::Applied(published) => state
            .cache()
            .record_published(&published.choices, published.published_at),
        Outcome::Skipped(Skip::LocalOnly) => {
            state.cache().record_published(&choices, Timestamp::now())
        }
        Outcome::Skipped(_) => {}
    }
    Ok(outcome)
}

/// Withdraw the published poll, shared or cached, when the machine moved away from it.
async fn settle(
    state: &SharedState,
    outcome: Outcome<SelectionChange>,
) -> Outcome<SelectionChange> {
    if let Outcome::Applied(SelectionChange {
        invalidates_poll: true,
        ..
    }) = &outcome
    {
        invalidate_published(state).await;
    }
    outcome
}

async fn invalidate_published(state: &SharedState) {
    let shared = match state.bridge().get_state().await {
        Ok(Outcome::Applied(snapshot)) => !snapshot.poll_choices.is_empty(),
        Ok(Outcome::Skipped(_)) => false,
        Err(err) => {
            warn!(error = %err, "poll state unreadable; withdrawing anyway");
            true
        }
    };
    if shared {
        if let Err(err) = state.bridge().clear_poll().await {
            warn!(error = %err, "failed to withdraw published poll");
        }
    }
    if !state.cache().snapshot().poll_choices.is_empty() {
        state.cache().clear_published();
    }
}
