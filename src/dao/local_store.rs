//! Synchronous string key-value storage scoped to one deployment.
//!
//! Holds the selection session state and the publish cache. The file-backed variant lets
//! several processes on the same host share the same view, which is what the storage
//! broadcast transport relies on.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use dashmap::DashMap;
use tracing::warn;

/// Minimal key-value capability surface.
pub trait LocalStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: String);
    /// Remove a value if present.
    fn remove(&self, key: &str);
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: DashMap<String, String>,
}

impl MemoryLocalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Store persisted as a single JSON object on disk.
///
/// Reads always go back to the file so that writes from other processes are observed.
/// Disk failures are logged; the write is then kept in memory only.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    fallback: Mutex<BTreeMap<String, String>>,
}

impl FileLocalStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = read_entries(&path).unwrap_or_default();
        Self {
            path,
            fallback: Mutex::new(initial),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) {
        let Ok(mut fallback) = self.fallback.lock() else {
            warn!(path = %self.path.display(), "local store lock poisoned; dropping write");
            return;
        };
        let mut entries = read_entries(&self.path).unwrap_or_else(|| fallback.clone());
        apply(&mut entries);
        if let Err(err) = write_entries(&self.path, &entries) {
            warn!(path = %self.path.display(), error = %err, "failed to persist local store");
        }
        *fallback = entries;
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        match read_entries(&self.path) {
            Some(entries) => entries.get(key).cloned(),
            None => self
                .fallback
                .lock()
                .ok()
                .and_then(|entries| entries.get(key).cloned()),
        }
    }

    fn set(&self, key: &str, value: String) {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| {
            entries.remove(key);
        });
    }
}

fn read_entries(path: &Path) -> Option<BTreeMap<String, String>> {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(entries) => Some(entries),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "local store file is malformed; ignoring it");
                None
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => Some(BTreeMap::new()),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read local store");
            None
        }
    }
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(entries).map_err(std::io::Error::other)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryLocalStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v".into());
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn file_store_is_shared_between_handles() {
        let dir = std::env::temp_dir().join(format!("bookclub-poll-{}", uuid::Uuid::new_v4()));
        let path = dir.join("local.json");
        let first = FileLocalStore::open(&path);
        let second = FileLocalStore::open(&path);

        first.set("pollChoices", "[]".into());
        assert_eq!(second.get("pollChoices").as_deref(), Some("[]"));

        second.remove("pollChoices");
        assert_eq!(first.get("pollChoices"), None);

        let _ = fs::remove_dir_all(dir);
    }
}
