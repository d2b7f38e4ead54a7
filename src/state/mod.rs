pub mod aggregation;
pub mod poll;
pub mod reel_driver;
pub mod selection;
mod sse;

use std::sync::Arc;

use reqwest::Client;

use crate::{
    config::AppConfig,
    dao::{
        local_store::{LocalStore, MemoryLocalStore},
        models::DocPath,
        poll_store::memory::MemoryPollStore,
    },
    services::{local_broadcast::ChannelBroadcast, poll_bridge::PollBridge, publish_cache::PublishCache},
    state::{reel_driver::ReelDriver, selection::SelectionEngine},
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

/// Capacity of the public SSE broadcast channel.
const PUBLIC_SSE_CAPACITY: usize = 64;

/// Central application state: configuration, the selection machine, the publish cache and
/// the realtime bridge.
pub struct AppState {
    config: AppConfig,
    bridge: PollBridge,
    cache: PublishCache,
    selection: ReelDriver,
    sse: SseHub,
    http: Client,
}

impl AppState {
    /// Assemble the state from already-built parts.
    pub fn new(
        config: AppConfig,
        bridge: PollBridge,
        cache: PublishCache,
        selection: ReelDriver,
    ) -> SharedState {
        Arc::new(Self {
            config,
            bridge,
            cache,
            selection,
            sse: SseHub::new(PUBLIC_SSE_CAPACITY),
            http: Client::new(),
        })
    }

    /// Fully in-process state: memory document store, memory key-value store and an
    /// in-process broadcast bus.
    pub fn in_memory(config: AppConfig) -> SharedState {
        let local: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let doc = DocPath::new(config.poll_collection.clone(), config.poll_document.clone());
        let bridge = PollBridge::new(Arc::new(MemoryPollStore::new()), doc);
        let cache = PublishCache::new(local.clone(), Arc::new(ChannelBroadcast::new()));
        let selection = ReelDriver::new(SelectionEngine::new(local.clone()), config.reel_tick);
        Self::new(config, bridge, cache, selection)
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Realtime poll store bridge.
    pub fn bridge(&self) -> &PollBridge {
        &self.bridge
    }

    /// Local publish cache.
    pub fn cache(&self) -> &PublishCache {
        &self.cache
    }

    /// Selection machine with its reel timers.
    pub fn selection(&self) -> &ReelDriver {
        &self.selection
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Shared HTTP client used for the candidate feed.
    pub fn http(&self) -> &Client {
        &self.http
    }
}
