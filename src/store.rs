//! Key-value store that persists across fragment lifecycles.
//!
//! Unlike a bridge, the store is schema-free: any JSON value can live under
//! any key. Persistence is a single best-effort snapshot file; read and write
//! failures are logged and otherwise ignored so a broken disk never breaks
//! the in-memory store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::subscription::Subscription;
use crate::util::panic;

type KeyCallback = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

struct StoreInner {
    data: Mutex<HashMap<String, Value>>,
    listeners: Mutex<HashMap<String, HashMap<u64, KeyCallback>>>,
    next_listener_id: AtomicU64,
    snapshot_path: Option<PathBuf>,
}

/// Shared key-value container with per-key subscriptions.
///
/// Listeners receive `Some(value)` after a set and `None` after a remove or
/// clear, synchronously on the mutating call. Clones share the same
/// underlying container.
#[derive(Clone)]
pub struct KeyValueStore {
    inner: Arc<StoreInner>,
}

impl KeyValueStore {
    /// Store without persistence.
    pub fn in_memory() -> Self {
        Self::with_snapshot(None)
    }

    /// Store backed by a JSON snapshot file.
    ///
    /// An existing snapshot is loaded at construction; every mutation
    /// rewrites it. Both directions are best-effort.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self::with_snapshot(Some(path.into()))
    }

    fn with_snapshot(snapshot_path: Option<PathBuf>) -> Self {
        let data = snapshot_path
            .as_deref()
            .map(load_snapshot)
            .unwrap_or_default();
        Self {
            inner: Arc::new(StoreInner {
                data: Mutex::new(data),
                listeners: Mutex::new(HashMap::new()),
                next_listener_id: AtomicU64::new(0),
                snapshot_path,
            }),
        }
    }

    /// Get the value stored under a key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.data.lock().get(key).cloned()
    }

    /// Set a value, persist, and notify the key's listeners.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        {
            let mut data = self.inner.data.lock();
            data.insert(key.clone(), value.clone());
            self.persist(&data);
        }
        self.notify(&key, Some(&value));
    }

    /// Remove a key, persist, and notify the key's listeners with `None`.
    pub fn remove(&self, key: &str) {
        {
            let mut data = self.inner.data.lock();
            data.remove(key);
            self.persist(&data);
        }
        self.notify(key, None);
    }

    /// Remove every key, persist, and notify each removed key's listeners.
    pub fn clear(&self) {
        let keys: Vec<String> = {
            let mut data = self.inner.data.lock();
            let keys = data.keys().cloned().collect();
            data.clear();
            self.persist(&data);
            keys
        };
        for key in keys {
            self.notify(&key, None);
        }
    }

    /// Subscribe to changes of a single key.
    pub fn subscribe(
        &self,
        key: impl Into<String>,
        listener: impl Fn(Option<&Value>) + Send + Sync + 'static,
    ) -> Subscription {
        let key = key.into();
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .entry(key.clone())
            .or_default()
            .insert(id, Arc::new(listener));

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut listeners = inner.listeners.lock();
                if let Some(entries) = listeners.get_mut(&key) {
                    entries.remove(&id);
                    if entries.is_empty() {
                        listeners.remove(&key);
                    }
                }
            }
        })
    }

    fn notify(&self, key: &str, value: Option<&Value>) {
        let listeners: Vec<KeyCallback> = {
            let listeners = self.inner.listeners.lock();
            listeners
                .get(key)
                .map(|entries| entries.values().cloned().collect())
                .unwrap_or_default()
        };
        for listener in listeners {
            if let Err(reason) = panic::isolate(|| listener(value)) {
                tracing::error!(key, reason = %reason, "store listener panicked");
            }
        }
    }

    fn persist(&self, data: &HashMap<String, Value>) {
        let Some(path) = &self.inner.snapshot_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(data) {
            Ok(json) => {
                if let Err(error) = fs::write(path, json) {
                    tracing::debug!(path = %path.display(), error = %error, "failed to write store snapshot");
                }
            }
            Err(error) => {
                tracing::debug!(error = %error, "failed to serialize store snapshot");
            }
        }
    }
}

impl Default for KeyValueStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn load_snapshot(path: &Path) -> HashMap<String, Value> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return HashMap::new(),
    };
    match serde_json::from_str(&contents) {
        Ok(data) => data,
        Err(error) => {
            tracing::debug!(path = %path.display(), error = %error, "ignoring unreadable store snapshot");
            HashMap::new()
        }
    }
}
