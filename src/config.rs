//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BOOKCLUB_POLL_CONFIG_PATH";
/// Environment variable that overrides the configured candidate feed.
const CANDIDATES_URL_ENV: &str = "CANDIDATES_URL";

/// Transport used to notify other local readers of publish cache changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// In-process broadcast channel.
    #[default]
    Channel,
    /// Poll the local key-value store.
    Storage,
}

/// Realtime backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeMode {
    /// In-process document store.
    Memory,
    /// CouchDB, configured through the `COUCH_*` environment variables.
    #[default]
    Couch,
    /// No backend: every realtime operation is a no-op.
    None,
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// CSV feed with the candidate books (http(s) URL or file path).
    pub candidates_url: Option<String>,
    /// Collection holding the shared poll document.
    pub poll_collection: String,
    /// Identifier of the shared poll document.
    pub poll_document: String,
    /// Period between two advances of a spinning reel.
    pub reel_tick: Duration,
    /// JSON file backing the local key-value store; in memory when absent.
    pub local_state_path: Option<PathBuf>,
    /// Publish cache notification transport.
    pub broadcast: BroadcastMode,
    /// Polling period of the storage broadcast transport.
    pub storage_poll: Duration,
    /// Realtime backend.
    pub realtime: RealtimeMode,
    /// Wipe the persisted selection and published choices at boot.
    pub reset_on_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            candidates_url: None,
            poll_collection: "polls".into(),
            poll_document: "current".into(),
            reel_tick: Duration::from_millis(180),
            local_state_path: None,
            broadcast: BroadcastMode::Channel,
            storage_poll: Duration::from_millis(500),
            realtime: RealtimeMode::Couch,
            reset_on_start: false,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        realtime = ?app_config.realtime,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env::var(CANDIDATES_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
        {
            self.candidates_url = Some(url);
        }
        self
    }
}

/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    candidates_url: Option<String>,
    poll_collection: Option<String>,
    poll_document: Option<String>,
    reel_tick_ms: Option<u64>,
    local_state_path: Option<PathBuf>,
    broadcast: Option<BroadcastMode>,
    storage_poll_ms: Option<u64>,
    realtime: Option<RealtimeMode>,
    reset_on_start: Option<bool>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            candidates_url: value.candidates_url.or(defaults.candidates_url),
            poll_collection: value.poll_collection.unwrap_or(defaults.poll_collection),
            poll_document: value.poll_document.unwrap_or(defaults.poll_document),
            reel_tick: value
                .reel_tick_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.reel_tick),
            local_state_path: value.local_state_path,
            broadcast: value.broadcast.unwrap_or(defaults.broadcast),
            storage_poll: value
                .storage_poll_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.storage_poll),
            realtime: value.realtime.unwrap_or(defaults.realtime),
            reset_on_start: value.reset_on_start.unwrap_or(defaults.reset_on_start),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"realtime":"memory","reel_tick_ms":90}"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.realtime, RealtimeMode::Memory);
        assert_eq!(config.reel_tick, Duration::from_millis(90));
        assert_eq!(config.poll_collection, "polls");
        assert_eq!(config.broadcast, BroadcastMode::Channel);
    }

    #[test]
    fn zero_periods_fall_back_to_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"reel_tick_ms":0,"storage_poll_ms":0,"broadcast":"storage"}"#)
                .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.reel_tick, Duration::from_millis(180));
        assert_eq!(config.storage_poll, Duration::from_millis(500));
        assert_eq!(config.broadcast, BroadcastMode::Storage);
    }
}
