//! The bridge: a single-namespace, schema-validated, observable state
//! container with an attached action-dispatch channel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::devtools::{self, DevtoolsHook};
use crate::subscription::Subscription;
use crate::util::panic;

use super::error::BridgeError;
use super::schema::{Schema, SchemaError};

type StateListener = Arc<dyn Fn(&Value, &Value) + Send + Sync>;
type ActionHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Configuration for creating a [`Bridge`].
pub struct BridgeConfig {
    /// Unique namespace for this bridge. Used for devtools registration and
    /// cross-fragment addressing; uniqueness is enforced only while the
    /// devtools hook is installed (there is no registry without it).
    pub namespace: String,
    /// Validator for the bridge's state.
    pub schema: Arc<dyn Schema>,
    /// Initial state. When absent, the schema's default value is used.
    pub initial_state: Option<Value>,
}

impl BridgeConfig {
    pub fn new(namespace: impl Into<String>, schema: Arc<dyn Schema>) -> Self {
        Self {
            namespace: namespace.into(),
            schema,
            initial_state: None,
        }
    }

    /// Set an explicit initial state, validated on creation.
    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }
}

struct BridgeCell {
    state: Value,
    state_listeners: HashMap<u64, StateListener>,
    key_listeners: HashMap<String, HashMap<u64, StateListener>>,
    action_handlers: HashMap<String, HashMap<u64, ActionHandler>>,
    next_listener_id: u64,
    action_count: u64,
    destroyed: bool,
}

struct BridgeInner {
    namespace: String,
    schema: Arc<dyn Schema>,
    /// Hook captured at creation; a hook installed later is not picked up.
    hook: Option<Arc<DevtoolsHook>>,
    cell: Mutex<BridgeCell>,
}

/// A shared state container for one namespace.
///
/// State is an immutable-by-replacement JSON object conforming to the
/// configured schema. Mutations go through [`set_state`](Bridge::set_state) /
/// [`set_state_with`](Bridge::set_state_with) and are atomic: a candidate
/// that fails validation changes nothing and notifies nobody. Clones share
/// the same underlying container.
///
/// Listener callbacks run synchronously on the mutating call, after the new
/// state is committed and outside the internal lock, so a listener may call
/// back into the bridge. A panicking listener is caught and reported without
/// affecting the mutation or sibling listeners.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Create a bridge with a validated initial state.
    ///
    /// When the devtools hook is installed the bridge registers itself;
    /// registration fails with [`BridgeError::DuplicateNamespace`] if a live
    /// bridge already claimed the namespace.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let BridgeConfig {
            namespace,
            schema,
            initial_state,
        } = config;

        let state = match initial_state {
            Some(value) => schema.safe_parse(&value),
            None => schema.default_value(),
        }
        .map_err(|source| BridgeError::Validation {
            namespace: namespace.clone(),
            source,
        })?;

        if !state.is_object() {
            return Err(BridgeError::Validation {
                namespace,
                source: SchemaError::single("$", "state must be a JSON object"),
            });
        }

        let inner = Arc::new(BridgeInner {
            namespace,
            schema,
            hook: devtools::devtools_hook(),
            cell: Mutex::new(BridgeCell {
                state,
                state_listeners: HashMap::new(),
                key_listeners: HashMap::new(),
                action_handlers: HashMap::new(),
                next_listener_id: 0,
                action_count: 0,
                destroyed: false,
            }),
        });

        if let Some(hook) = &inner.hook {
            let accessor = {
                let inner = inner.clone();
                Arc::new(move || inner.cell.lock().state.clone())
                    as Arc<dyn Fn() -> Value + Send + Sync>
            };
            hook.register_bridge(&inner.namespace, accessor)
                .map_err(|e| BridgeError::DuplicateNamespace {
                    namespace: e.namespace,
                })?;
        }

        Ok(Self { inner })
    }

    /// The bridge's namespace.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Current state.
    pub fn state(&self) -> Result<Value, BridgeError> {
        let cell = self.inner.cell.lock();
        if cell.destroyed {
            return Err(self.destroyed_error());
        }
        Ok(cell.state.clone())
    }

    /// Number of actions dispatched through this bridge.
    pub fn action_count(&self) -> u64 {
        self.inner.cell.lock().action_count
    }

    /// Whether the bridge has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.cell.lock().destroyed
    }

    /// Apply a partial update: the given keys are shallow-merged over the
    /// current state and the result is validated before it replaces it.
    pub fn set_state(&self, updates: Map<String, Value>) -> Result<(), BridgeError> {
        self.apply_update(|_| updates)
    }

    /// Apply a partial update computed from the previous state.
    ///
    /// The closure must be a pure function of its argument; it runs inside
    /// the bridge's internal lock and must not call back into the bridge.
    pub fn set_state_with<F>(&self, updater: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&Value) -> Map<String, Value>,
    {
        self.apply_update(updater)
    }

    fn apply_update<F>(&self, updater: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&Value) -> Map<String, Value>,
    {
        let (new_state, prev_state, state_listeners, key_notifications) = {
            let mut cell = self.inner.cell.lock();
            if cell.destroyed {
                return Err(self.destroyed_error());
            }

            let prev_state = cell.state.clone();
            let updates = updater(&prev_state);

            let mut candidate = prev_state.as_object().cloned().unwrap_or_default();
            for (key, value) in updates {
                candidate.insert(key, value);
            }

            let new_state = self
                .inner
                .schema
                .safe_parse(&Value::Object(candidate))
                .map_err(|source| BridgeError::Validation {
                    namespace: self.inner.namespace.clone(),
                    source,
                })?;

            cell.state = new_state.clone();

            let state_listeners: Vec<StateListener> =
                cell.state_listeners.values().cloned().collect();

            let mut key_notifications = Vec::new();
            for (key, listeners) in &cell.key_listeners {
                let prev_value = prev_state.get(key).cloned().unwrap_or(Value::Null);
                let new_value = new_state.get(key).cloned().unwrap_or(Value::Null);
                if new_value != prev_value {
                    key_notifications.push((
                        key.clone(),
                        new_value,
                        prev_value,
                        listeners.values().cloned().collect::<Vec<_>>(),
                    ));
                }
            }

            (new_state, prev_state, state_listeners, key_notifications)
        };

        for listener in state_listeners {
            if let Err(reason) = panic::isolate(|| listener(&new_state, &prev_state)) {
                tracing::error!(
                    namespace = %self.inner.namespace,
                    reason = %reason,
                    "state listener panicked"
                );
            }
        }

        for (key, new_value, prev_value, listeners) in key_notifications {
            for listener in listeners {
                if let Err(reason) = panic::isolate(|| listener(&new_value, &prev_value)) {
                    tracing::error!(
                        namespace = %self.inner.namespace,
                        key = %key,
                        reason = %reason,
                        "key listener panicked"
                    );
                }
            }
        }

        if let Some(hook) = &self.inner.hook {
            hook.notify_state_change(&self.inner.namespace, &new_state, &prev_state);
        }

        Ok(())
    }

    /// Subscribe to every state change. The listener receives
    /// `(new_state, prev_state)`.
    pub fn subscribe(
        &self,
        listener: impl Fn(&Value, &Value) + Send + Sync + 'static,
    ) -> Result<Subscription, BridgeError> {
        let id = {
            let mut cell = self.inner.cell.lock();
            if cell.destroyed {
                return Err(self.destroyed_error());
            }
            let id = cell.next_listener_id;
            cell.next_listener_id += 1;
            cell.state_listeners.insert(id, Arc::new(listener));
            id
        };

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.cell.lock().state_listeners.remove(&id);
            }
        }))
    }

    /// Subscribe to changes of a single state key. The listener receives
    /// `(new_value, prev_value)` and only fires when the value actually
    /// changed.
    pub fn subscribe_key(
        &self,
        key: impl Into<String>,
        listener: impl Fn(&Value, &Value) + Send + Sync + 'static,
    ) -> Result<Subscription, BridgeError> {
        let key = key.into();
        let id = {
            let mut cell = self.inner.cell.lock();
            if cell.destroyed {
                return Err(self.destroyed_error());
            }
            let id = cell.next_listener_id;
            cell.next_listener_id += 1;
            cell.key_listeners
                .entry(key.clone())
                .or_default()
                .insert(id, Arc::new(listener));
            id
        };

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut cell = inner.cell.lock();
                if let Some(listeners) = cell.key_listeners.get_mut(&key) {
                    listeners.remove(&id);
                    if listeners.is_empty() {
                        cell.key_listeners.remove(&key);
                    }
                }
            }
        }))
    }

    /// Dispatch a named action to every registered handler.
    ///
    /// Dispatching an action with no handlers is a no-op, not an error.
    pub fn dispatch(&self, action: &str, payload: Option<Value>) -> Result<(), BridgeError> {
        let handlers = {
            let mut cell = self.inner.cell.lock();
            if cell.destroyed {
                return Err(self.destroyed_error());
            }
            cell.action_count += 1;
            cell.action_handlers
                .get(action)
                .map(|handlers| handlers.values().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        };

        if let Some(hook) = &self.inner.hook {
            hook.notify_action(&self.inner.namespace, action, payload.clone());
        }

        let payload = payload.unwrap_or(Value::Null);
        for handler in handlers {
            if let Err(reason) = panic::isolate(|| handler(&payload)) {
                tracing::error!(
                    namespace = %self.inner.namespace,
                    action = %action,
                    reason = %reason,
                    "action handler panicked"
                );
            }
        }

        Ok(())
    }

    /// Register a handler for a named action.
    pub fn on_action(
        &self,
        action: impl Into<String>,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Result<Subscription, BridgeError> {
        let action = action.into();
        let id = {
            let mut cell = self.inner.cell.lock();
            if cell.destroyed {
                return Err(self.destroyed_error());
            }
            let id = cell.next_listener_id;
            cell.next_listener_id += 1;
            cell.action_handlers
                .entry(action.clone())
                .or_default()
                .insert(id, Arc::new(handler));
            id
        };

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut cell = inner.cell.lock();
                if let Some(handlers) = cell.action_handlers.get_mut(&action) {
                    handlers.remove(&id);
                    if handlers.is_empty() {
                        cell.action_handlers.remove(&action);
                    }
                }
            }
        }))
    }

    /// Destroy the bridge: clear every listener and handler, unregister from
    /// the devtools hook, and reject all further operations.
    ///
    /// Destruction is not idempotent; a second call fails with
    /// [`BridgeError::Destroyed`].
    pub fn destroy(&self) -> Result<(), BridgeError> {
        {
            let mut cell = self.inner.cell.lock();
            if cell.destroyed {
                return Err(self.destroyed_error());
            }
            cell.destroyed = true;
            cell.state_listeners.clear();
            cell.key_listeners.clear();
            cell.action_handlers.clear();
        }

        if let Some(hook) = &self.inner.hook {
            hook.unregister_bridge(&self.inner.namespace);
        }

        Ok(())
    }

    fn destroyed_error(&self) -> BridgeError {
        BridgeError::Destroyed {
            namespace: self.inner.namespace.clone(),
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cell = self.inner.cell.lock();
        f.debug_struct("Bridge")
            .field("namespace", &self.inner.namespace)
            .field("action_count", &cell.action_count)
            .field("destroyed", &cell.destroyed)
            .finish()
    }
}
