//! Introspection registry mirroring bridge state and activity events.
//!
//! The hook is a pass-through notifier: it owns the registry of live bridges
//! and fans every state change, action, and bus event out to subscribers, but
//! retains no event history itself. Retention is the consumer's job (the
//! panel connector keeps a bounded ring).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::subscription::Subscription;
use crate::util::panic;

type StateAccessor = Arc<dyn Fn() -> Value + Send + Sync>;
type BridgesCallback = Arc<dyn Fn(&[BridgeSnapshot]) + Send + Sync>;
type EventCallback = Arc<dyn Fn(&EventLogEntry) + Send + Sync>;

/// Point-in-time view of one registered bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSnapshot {
    pub namespace: String,
    pub state: Value,
    pub action_count: u64,
}

/// Remote fragment module, registered for informational display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteInfo {
    pub name: String,
    pub url: String,
    pub loaded: bool,
}

/// One logged activity event, carried over the relay to observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventLogEntry {
    /// Process-monotonic id, fresh per entry.
    pub id: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(flatten)]
    pub record: EventRecord,
}

/// Tag-specific payload of an [`EventLogEntry`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventRecord {
    #[serde(rename_all = "camelCase")]
    StateChange {
        namespace: String,
        prev_state: Value,
        new_state: Value,
    },
    Action {
        namespace: String,
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Event {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

/// Rejected bridge registration: the namespace is already live.
#[derive(Debug, thiserror::Error)]
#[error("a live bridge named \"{namespace}\" is already registered")]
pub struct DuplicateNamespaceError {
    pub namespace: String,
}

struct RegisteredBridge {
    get_state: StateAccessor,
    action_count: u64,
}

/// Process-wide introspection surface for devtools observers.
///
/// Installed at most once per process via [`crate::devtools::enable_devtools`]
/// and never torn down. Bridges register on creation and unregister on
/// destroy; each transition re-notifies bridge subscribers with a fresh
/// snapshot. Callbacks are panic-isolated: one failing subscriber never
/// blocks the others.
pub struct DevtoolsHook {
    registry: Mutex<HashMap<String, RegisteredBridge>>,
    bridge_subscribers: Arc<Mutex<HashMap<u64, BridgesCallback>>>,
    event_subscribers: Arc<Mutex<HashMap<u64, EventCallback>>>,
    remotes: Mutex<HashMap<String, RemoteInfo>>,
    next_subscription_id: AtomicU64,
    next_event_id: AtomicU64,
}

impl DevtoolsHook {
    pub(crate) fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            bridge_subscribers: Arc::new(Mutex::new(HashMap::new())),
            event_subscribers: Arc::new(Mutex::new(HashMap::new())),
            remotes: Mutex::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(0),
            next_event_id: AtomicU64::new(0),
        }
    }

    /// Snapshot of every currently registered bridge.
    ///
    /// State is read through each bridge's accessor at query time; the hook
    /// never caches a copy.
    pub fn bridges(&self) -> Vec<BridgeSnapshot> {
        let registry = self.registry.lock();
        let mut snapshots: Vec<BridgeSnapshot> = registry
            .iter()
            .map(|(namespace, bridge)| BridgeSnapshot {
                namespace: namespace.clone(),
                state: (bridge.get_state)(),
                action_count: bridge.action_count,
            })
            .collect();
        snapshots.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        snapshots
    }

    /// Subscribe to bridge registry changes (register, unregister, state
    /// change). The callback receives a fresh snapshot each time.
    pub fn subscribe(
        &self,
        callback: impl Fn(&[BridgeSnapshot]) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        self.bridge_subscribers.lock().insert(id, Arc::new(callback));
        let subscribers = Arc::downgrade(&self.bridge_subscribers);
        Subscription::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.lock().remove(&id);
            }
        })
    }

    /// Subscribe to every logged activity event.
    pub fn subscribe_events(
        &self,
        callback: impl Fn(&EventLogEntry) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        self.event_subscribers.lock().insert(id, Arc::new(callback));
        let subscribers = Arc::downgrade(&self.event_subscribers);
        Subscription::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.lock().remove(&id);
            }
        })
    }

    /// Register a live bridge. Called by [`crate::Bridge`] on creation.
    ///
    /// Duplicate namespaces are rejected while the previous registration is
    /// still live; after the owning bridge is destroyed the namespace can be
    /// reused.
    pub fn register_bridge(
        &self,
        namespace: &str,
        get_state: Arc<dyn Fn() -> Value + Send + Sync>,
    ) -> Result<(), DuplicateNamespaceError> {
        {
            let mut registry = self.registry.lock();
            if registry.contains_key(namespace) {
                return Err(DuplicateNamespaceError {
                    namespace: namespace.to_string(),
                });
            }
            registry.insert(
                namespace.to_string(),
                RegisteredBridge {
                    get_state,
                    action_count: 0,
                },
            );
        }
        self.notify_bridge_subscribers();
        Ok(())
    }

    /// Remove a bridge registration. Called by [`crate::Bridge`] on destroy;
    /// a no-op if the namespace is not registered.
    pub fn unregister_bridge(&self, namespace: &str) {
        let removed = self.registry.lock().remove(namespace).is_some();
        if removed {
            self.notify_bridge_subscribers();
        }
    }

    /// Record a state transition and re-notify bridge subscribers.
    pub fn notify_state_change(&self, namespace: &str, new_state: &Value, prev_state: &Value) {
        self.publish_event(EventRecord::StateChange {
            namespace: namespace.to_string(),
            prev_state: prev_state.clone(),
            new_state: new_state.clone(),
        });
        self.notify_bridge_subscribers();
    }

    /// Record a dispatched action and bump the namespace's action count.
    pub fn notify_action(&self, namespace: &str, action: &str, payload: Option<Value>) {
        if let Some(bridge) = self.registry.lock().get_mut(namespace) {
            bridge.action_count += 1;
        }
        self.publish_event(EventRecord::Action {
            namespace: namespace.to_string(),
            action: action.to_string(),
            payload,
        });
    }

    /// Record an event-bus emission.
    pub fn notify_event(&self, event: &str, payload: Option<Value>) {
        self.publish_event(EventRecord::Event {
            event: event.to_string(),
            payload,
        });
    }

    /// Register a remote fragment module, overwriting any previous entry
    /// with the same name.
    pub fn register_remote(&self, remote: RemoteInfo) {
        self.remotes.lock().insert(remote.name.clone(), remote);
    }

    /// All registered remote fragment modules.
    pub fn remotes(&self) -> Vec<RemoteInfo> {
        let remotes = self.remotes.lock();
        let mut all: Vec<RemoteInfo> = remotes.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    fn notify_bridge_subscribers(&self) {
        let snapshot = self.bridges();
        let subscribers: Vec<BridgesCallback> =
            self.bridge_subscribers.lock().values().cloned().collect();
        for subscriber in subscribers {
            if let Err(reason) = panic::isolate(|| subscriber(&snapshot)) {
                tracing::error!(reason = %reason, "bridge subscriber panicked");
            }
        }
    }

    fn publish_event(&self, record: EventRecord) {
        let entry = EventLogEntry {
            id: self.next_event_id.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now().timestamp_millis(),
            record,
        };
        let subscribers: Vec<EventCallback> =
            self.event_subscribers.lock().values().cloned().collect();
        for subscriber in subscribers {
            if let Err(reason) = panic::isolate(|| subscriber(&entry)) {
                tracing::error!(reason = %reason, "event subscriber panicked");
            }
        }
    }
}
