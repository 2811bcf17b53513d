//! Lightweight event bus for one-off signals between fragments.
//!
//! No retained state: an emit reaches the handlers registered at that moment
//! and is gone. Emissions are mirrored to the devtools hook when installed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::devtools;
use crate::subscription::Subscription;
use crate::util::panic;

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

struct HandlerEntry {
    handler: Handler,
    once: bool,
}

struct BusInner {
    handlers: Mutex<HashMap<String, HashMap<u64, HandlerEntry>>>,
    next_handler_id: AtomicU64,
}

/// Transient publish/subscribe channel.
///
/// Handlers run synchronously on the emitting call, each isolated from the
/// others: a panicking handler is reported and skipped, never blocking the
/// rest. Clones share the same underlying channel.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: Mutex::new(HashMap::new()),
                next_handler_id: AtomicU64::new(0),
            }),
        }
    }

    /// Emit an event with an optional payload to every registered handler.
    ///
    /// Handlers receive `Null` when no payload is given. A handler
    /// unsubscribed by an earlier handler of the same emit is skipped.
    pub fn emit(&self, event: &str, payload: Option<Value>) {
        if let Some(hook) = devtools::devtools_hook() {
            hook.notify_event(event, payload.clone());
        }

        let snapshot: Vec<(u64, Handler, bool)> = {
            let handlers = self.inner.handlers.lock();
            handlers
                .get(event)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|(id, entry)| (*id, entry.handler.clone(), entry.once))
                        .collect()
                })
                .unwrap_or_default()
        };

        let payload = payload.unwrap_or(Value::Null);
        for (id, handler, once) in snapshot {
            let live = {
                let mut handlers = self.inner.handlers.lock();
                match handlers.get_mut(event) {
                    Some(entries) => {
                        if once {
                            // Deregister before invoking so a re-entrant emit
                            // from inside the handler cannot deliver twice.
                            let removed = entries.remove(&id).is_some();
                            if entries.is_empty() {
                                handlers.remove(event);
                            }
                            removed
                        } else {
                            entries.contains_key(&id)
                        }
                    }
                    None => false,
                }
            };
            if !live {
                continue;
            }
            if let Err(reason) = panic::isolate(|| handler(&payload)) {
                tracing::error!(event, reason = %reason, "event handler panicked");
            }
        }
    }

    /// Subscribe to an event.
    pub fn on(
        &self,
        event: &str,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(event, Arc::new(handler), false)
    }

    /// Subscribe to an event for a single delivery.
    ///
    /// The registration is removed before the handler runs, so at most one
    /// delivery happens across any number of emits, re-entrant ones included.
    pub fn once(
        &self,
        event: &str,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(event, Arc::new(handler), true)
    }

    /// Remove every handler registered for an event.
    ///
    /// Removing a single handler goes through the [`Subscription`] returned
    /// by [`on`](EventBus::on) / [`once`](EventBus::once).
    pub fn off(&self, event: &str) {
        self.inner.handlers.lock().remove(event);
    }

    fn register(&self, event: &str, handler: Handler, once: bool) -> Subscription {
        let id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .entry(event.to_string())
            .or_default()
            .insert(id, HandlerEntry { handler, once });

        let inner = Arc::downgrade(&self.inner);
        let event = event.to_string();
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut handlers = inner.handlers.lock();
                if let Some(entries) = handlers.get_mut(&event) {
                    entries.remove(&id);
                    if entries.is_empty() {
                        handlers.remove(&event);
                    }
                }
            }
        })
    }

    #[cfg(test)]
    fn handler_count(&self, event: &str) -> usize {
        self.inner
            .handlers
            .lock()
            .get(event)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
