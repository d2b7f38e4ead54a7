use serde::Serialize;
use tracing::warn;

use crate::{
    dto::sse::{ServerEvent, VoteCountsEvent},
    outcome::Outcome,
    services::publish_cache::CacheEvent,
    state::{
        SharedState,
        aggregation::NamesByBook,
        poll::PollSnapshot,
        reel_driver::SelectionEvent,
    },
};

const EVENT_POLL_STATE: &str = "poll.state";
const EVENT_POLL_VOTES: &str = "poll.votes";
const EVENT_POLL_RUNOFF_VOTES: &str = "poll.runoff_votes";
const EVENT_POLL_PUBLISHED: &str = "poll.published";
const EVENT_POLL_CLEARED: &str = "poll.cleared";
const EVENT_POLL_WINNER: &str = "poll.winner";
const EVENT_POLL_RESET: &str = "poll.reset";
const EVENT_SELECTION_CHANGED: &str = "selection.changed";
const EVENT_SELECTION_FRAME: &str = "selection.frame";
const EVENT_CACHE_SNAPSHOT: &str = "cache.snapshot";

/// Broadcast the latest shared poll document.
pub fn broadcast_poll_state(state: &SharedState, snapshot: &PollSnapshot) {
    send_public_event(state, EVENT_POLL_STATE, snapshot);
}

/// Broadcast the regular votes grouped by book, with their counts.
pub fn broadcast_votes(state: &SharedState, names: NamesByBook) {
    send_public_event(state, EVENT_POLL_VOTES, &VoteCountsEvent::from(names));
}

/// Broadcast the runoff votes grouped by book, with their counts.
pub fn broadcast_runoff_votes(state: &SharedState, names: NamesByBook) {
    send_public_event(
        state,
        EVENT_POLL_RUNOFF_VOTES,
        &VoteCountsEvent::from(names),
    );
}

/// Relay a publish cache change.
pub fn broadcast_cache_event(state: &SharedState, event: &CacheEvent) {
    let name = match event {
        CacheEvent::Published { .. } => EVENT_POLL_PUBLISHED,
        CacheEvent::Cleared => EVENT_POLL_CLEARED,
        CacheEvent::WinnerAnnounced { .. } => EVENT_POLL_WINNER,
        CacheEvent::Reset => EVENT_POLL_RESET,
    };
    send_public_event(state, name, event);
}

/// Relay a reel frame or a selection change.
pub fn broadcast_selection_event(state: &SharedState, event: &SelectionEvent) {
    match event {
        SelectionEvent::Frame(frame) => send_public_event(state, EVENT_SELECTION_FRAME, frame),
        SelectionEvent::Changed(snapshot) => {
            send_public_event(state, EVENT_SELECTION_CHANGED, snapshot)
        }
    }
}

/// Events replayed to a client that just connected: the reels, the local publish cache
/// and, when a shared store is attached, the poll document.
pub async fn catch_up_events(state: &SharedState) -> Vec<ServerEvent> {
    let mut events = Vec::with_capacity(3);
    let selection = state.selection().snapshot().await;
    events.extend(encode(EVENT_SELECTION_CHANGED, &selection));
    events.extend(encode(EVENT_CACHE_SNAPSHOT, &state.cache().snapshot()));
    match state.bridge().get_state().await {
        Ok(Outcome::Applied(snapshot)) => events.extend(encode(EVENT_POLL_STATE, &snapshot)),
        Ok(Outcome::Skipped(_)) => {}
        Err(err) => warn!(error = %err, "poll state unavailable for catch-up"),
    }
    events
}

fn send_public_event<T: Serialize + ?Sized>(state: &SharedState, event: &str, payload: &T) {
    if let Some(message) = encode(event, payload) {
        state.public_sse().broadcast(message);
    }
}

fn encode<T: Serialize + ?Sized>(event: &str, payload: &T) -> Option<ServerEvent> {
    ServerEvent::json(Some(event.to_string()), payload)
        .inspect_err(|err| warn!(event, error = %err, "failed to serialize public SSE payload"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn cache_events_use_dotted_names() {
        let state = AppState::in_memory(AppConfig::default());
        let mut rx = state.public_sse().subscribe();

        broadcast_cache_event(&state, &CacheEvent::Cleared);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("poll.cleared"));
        assert_eq!(event.data, r#"{"type":"cleared"}"#);
    }

    #[tokio::test]
    async fn catch_up_covers_reels_cache_and_document() {
        let state = AppState::in_memory(AppConfig::default());
        let names: Vec<_> = catch_up_events(&state)
            .await
            .into_iter()
            .filter_map(|event| event.event)
            .collect();
        assert_eq!(names, vec!["selection.changed", "cache.snapshot", "poll.state"]);
    }

    #[tokio::test]
    async fn vote_events_carry_counts() {
        let state = AppState::in_memory(AppConfig::default());
        let mut rx = state.public_sse().subscribe();
        let mut names = NamesByBook::new();
        names.insert("Dune".into(), vec!["Ann".into(), "Bob".into()]);

        broadcast_votes(&state, names);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("poll.votes"));
        let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(payload["counts"]["Dune"], 2);
        assert_eq!(payload["names"]["Dune"][1], "Bob");
    }
}
