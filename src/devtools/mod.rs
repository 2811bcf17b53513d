//! Process-wide devtools hook: install, lookup, and the introspection surface.
//!
//! The hook is deliberately opt-in. Nothing registers or reports anywhere
//! until [`enable_devtools`] has been called, and every call site treats the
//! absent hook as "devtools integration disabled", never as an error.

mod hook;

pub use hook::{
    BridgeSnapshot, DevtoolsHook, DuplicateNamespaceError, EventLogEntry, EventRecord, RemoteInfo,
};

use std::sync::{Arc, OnceLock};

static HOOK: OnceLock<Arc<DevtoolsHook>> = OnceLock::new();

/// Install the process-wide devtools hook and return it.
///
/// Idempotent: later calls return the hook installed by the first one. Call
/// this before creating bridges so they register themselves for inspection.
/// Once installed the hook stays for the life of the process.
pub fn enable_devtools() -> Arc<DevtoolsHook> {
    HOOK.get_or_init(|| Arc::new(DevtoolsHook::new())).clone()
}

/// The installed hook, if devtools integration was enabled.
pub fn devtools_hook() -> Option<Arc<DevtoolsHook>> {
    HOOK.get().cloned()
}

/// Whether the devtools hook has been installed.
pub fn devtools_enabled() -> bool {
    HOOK.get().is_some()
}
