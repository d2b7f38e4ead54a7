//! Background forwarders from the live feeds to the public SSE stream.

use std::pin::pin;

use futures::StreamExt;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, info};

use crate::{services::sse_events, state::SharedState, subscription::Subscription};

/// Handles of the running forwarders.
pub struct SyncTasks {
    tasks: Vec<JoinHandle<()>>,
}

impl SyncTasks {
    /// Number of forwarders still running.
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }

    /// Stop every forwarder; their feeds are cancelled with them.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

fn forward<T, F>(feed: Subscription<T>, name: &'static str, mut emit: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    tokio::spawn(async move {
        let mut values = pin!(feed.into_stream());
        while let Some(value) = values.next().await {
            emit(value);
        }
        debug!(feed = name, "live feed closed");
    })
}

/// Spawn one forwarder per feed: the shared poll document, both vote collections, the
/// publish cache and the selection machine.
///
/// In local-only mode the shared-store feeds close immediately and their forwarders exit.
pub fn spawn(state: &SharedState) -> SyncTasks {
    let mut tasks = Vec::with_capacity(5);

    let target = state.clone();
    tasks.push(forward(state.bridge().subscribe(), "poll document", move |snapshot| {
        sse_events::broadcast_poll_state(&target, &snapshot)
    }));

    let target = state.clone();
    tasks.push(forward(state.bridge().subscribe_votes(), "votes", move |names| {
        sse_events::broadcast_votes(&target, names)
    }));

    let target = state.clone();
    tasks.push(forward(
        state.bridge().subscribe_runoff_votes(),
        "runoff votes",
        move |names| sse_events::broadcast_runoff_votes(&target, names),
    ));

    let target = state.clone();
    tasks.push(forward(state.cache().subscribe(), "publish cache", move |event| {
        sse_events::broadcast_cache_event(&target, &event)
    }));

    let mut selection = state.selection().subscribe();
    let target = state.clone();
    tasks.push(tokio::spawn(async move {
        loop {
            match selection.recv().await {
                Ok(event) => sse_events::broadcast_selection_event(&target, &event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "selection feed lagged"),
                Err(RecvError::Closed) => break,
            }
        }
        debug!("selection feed closed");
    }));

    info!(
        local_only = state.bridge().is_local_only(),
        "live feed forwarders started"
    );
    SyncTasks { tasks }
}
