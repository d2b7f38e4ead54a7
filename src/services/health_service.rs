use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the shared poll store; local-only mode always reports degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(backend) = state.bridge().backend() else {
        warn!("no realtime poll store attached (local-only mode)");
        return HealthResponse::degraded(false);
    };

    match backend.health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "realtime poll store health check failed");
            HealthResponse::degraded(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            local_store::{LocalStore, MemoryLocalStore},
            models::DocPath,
            poll_store::memory::MemoryPollStore,
        },
        services::{
            local_broadcast::ChannelBroadcast, poll_bridge::PollBridge, publish_cache::PublishCache,
        },
        state::{
            AppState,
            reel_driver::{DEFAULT_TICK, ReelDriver},
            selection::SelectionEngine,
        },
    };

    fn state_with(bridge: PollBridge) -> crate::state::SharedState {
        let local: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let cache = PublishCache::new(local.clone(), Arc::new(ChannelBroadcast::new()));
        let selection = ReelDriver::new(SelectionEngine::new(local.clone()), DEFAULT_TICK);
        AppState::new(AppConfig::default(), bridge, cache, selection)
    }

    #[tokio::test]
    async fn memory_store_is_healthy() {
        let state = AppState::in_memory(AppConfig::default());
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert!(health.realtime);
    }

    #[tokio::test]
    async fn local_only_is_degraded() {
        let state = state_with(PollBridge::local_only(DocPath::new("polls", "current")));
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert!(!health.realtime);
    }

    #[tokio::test]
    async fn unreachable_store_is_degraded() {
        let store = MemoryPollStore::new();
        store.set_offline(true);
        let state = state_with(PollBridge::new(
            Arc::new(store),
            DocPath::new("polls", "current"),
        ));
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert!(health.realtime);
    }
}
