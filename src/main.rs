//! Book club poll binary entrypoint wiring REST, SSE, the selection machine and the
//! realtime poll store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use bookclub_poll::{
    config::{AppConfig, BroadcastMode, RealtimeMode},
    dao::{
        local_store::{FileLocalStore, LocalStore, MemoryLocalStore},
        models::DocPath,
        poll_store::memory::MemoryPollStore,
    },
    routes,
    services::{
        local_broadcast::{ChannelBroadcast, LocalBroadcast, StorageBroadcast},
        poll_bridge::PollBridge,
        publish_cache::PublishCache,
        selection_service, sync_service,
    },
    state::{AppState, SharedState, reel_driver::ReelDriver, selection::SelectionEngine},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let local: Arc<dyn LocalStore> = match &config.local_state_path {
        Some(path) => {
            info!(path = %path.display(), "using file-backed local state");
            Arc::new(FileLocalStore::open(path.clone()))
        }
        None => Arc::new(MemoryLocalStore::new()),
    };
    let remote: Arc<dyn LocalBroadcast> = match config.broadcast {
        BroadcastMode::Channel => Arc::new(ChannelBroadcast::new()),
        BroadcastMode::Storage => {
            Arc::new(StorageBroadcast::new(local.clone(), config.storage_poll))
        }
    };

    let doc = DocPath::new(config.poll_collection.clone(), config.poll_document.clone());
    let bridge = connect_bridge(config.realtime, doc).await;
    let cache = PublishCache::new(local.clone(), remote);
    let selection = ReelDriver::new(SelectionEngine::new(local.clone()), config.reel_tick);
    let reset_on_start = config.reset_on_start;
    let app_state = AppState::new(config, bridge, cache, selection);

    if reset_on_start {
        info!("forcing a fresh selection session");
        app_state.cache().wipe_published();
        app_state.selection().reset().await;
    }

    let sync = sync_service::spawn(&app_state);
    tokio::spawn(load_candidates(app_state.clone()));

    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    sync.shutdown();
    app_state.selection().shutdown().await;
    info!("server stopped");
    Ok(())
}

/// Pick the realtime backend once; any failure leaves the service in local-only mode.
async fn connect_bridge(mode: RealtimeMode, doc: DocPath) -> PollBridge {
    match mode {
        RealtimeMode::None => {
            info!("realtime store disabled; running local-only");
            PollBridge::local_only(doc)
        }
        RealtimeMode::Memory => {
            info!("using in-process realtime store");
            PollBridge::new(Arc::new(MemoryPollStore::new()), doc)
        }
        RealtimeMode::Couch => connect_couch(doc).await,
    }
}

#[cfg(feature = "couch-store")]
async fn connect_couch(doc: DocPath) -> PollBridge {
    use bookclub_poll::dao::poll_store::couchdb::{CouchConfig, CouchPollStore};

    if !CouchConfig::is_configured() {
        warn!("COUCH_BASE_URL not set; running local-only");
        return PollBridge::local_only(doc);
    }
    let config = match CouchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "invalid CouchDB configuration; running local-only");
            return PollBridge::local_only(doc);
        }
    };
    match CouchPollStore::connect(config).await {
        Ok(store) => {
            info!("connected to CouchDB");
            PollBridge::new(Arc::new(store), doc)
        }
        Err(err) => {
            warn!(error = %err, "CouchDB unreachable; running local-only");
            PollBridge::local_only(doc)
        }
    }
}

#[cfg(not(feature = "couch-store"))]
async fn connect_couch(doc: DocPath) -> PollBridge {
    warn!("built without the couch-store feature; running local-only");
    PollBridge::local_only(doc)
}

/// Initial candidate load; a failure leaves the reels disabled until a reload.
async fn load_candidates(state: SharedState) {
    if let Err(err) = selection_service::reload_candidates(&state).await {
        error!(error = %err, "selection disabled until candidates are reloaded");
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
