//! Panic capture for listener isolation.
//!
//! Listener and handler callbacks run arbitrary user code; a panic in one of
//! them must never take down the mutation that triggered it or starve sibling
//! listeners. Callers wrap each invocation with [`isolate`] and report the
//! captured payload on their own diagnostic fields.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a callback, converting a panic into a description of its payload.
pub fn isolate(f: impl FnOnce()) -> Result<(), String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
