//! Shared test utilities for statewire
//!
//! Provides common helpers for the integration tests:
//! - Unique namespaces, so tests sharing the process-wide hook never collide
//! - A guard serializing tests that assert on global hook traffic
//! - Callback capture buffers and the cart fixture schema

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use statewire::{Bridge, BridgeConfig, Schema, TypedSchema};

/// The devtools hook is installed once per process and never torn down;
/// tests that assert on its traffic hold this guard to keep their event
/// streams readable.
pub static HOOK_TEST_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

static NAMESPACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique bridge namespace with a readable prefix.
pub fn unique_namespace(prefix: &str) -> String {
    let n = NAMESPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{n}")
}

/// Collects callback invocations for later assertions.
pub struct Capture<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Capture<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Clone for Capture<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Capture<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cart fixture schema used across bridge tests.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CartState {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub quantity: u32,
}

pub fn cart_schema() -> Arc<dyn Schema> {
    Arc::new(TypedSchema::<CartState>::new())
}

/// Bridge over the cart schema with an empty cart, under a unique namespace.
pub fn cart_bridge(prefix: &str) -> Bridge {
    Bridge::new(
        BridgeConfig::new(unique_namespace(prefix), cart_schema())
            .with_initial_state(serde_json::json!({"items": [], "total": 0.0})),
    )
    .expect("cart bridge should build")
}
