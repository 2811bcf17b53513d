//! Wire protocol spoken between the relay contexts.
//!
//! Every message is a plain JSON object with a kebab-case `type` tag and
//! camelCase fields, so the broker can route on `type`/`tabId` without
//! knowing anything else about the payload. Typed endpoints convert through
//! [`encode`] / [`decode`]; unknown messages stay raw `Value`s and are
//! forwarded untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::devtools::{BridgeSnapshot, EventLogEntry, RemoteInfo};

/// Identifier of the inspected tab a connection belongs to.
pub type TabId = u32;

/// The relay message set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WireMessage {
    /// Panel -> broker: bind this panel connection to a tab.
    #[serde(rename_all = "camelCase")]
    Init { tab_id: TabId },

    /// Broker/panel -> content: request a fresh snapshot.
    GetBridges,

    /// Content -> panel: full snapshot of bridges and remotes.
    BridgeData {
        bridges: Vec<BridgeSnapshot>,
        remotes: Vec<RemoteInfo>,
    },

    /// Content -> panel: bridge registry changed.
    BridgeUpdate { bridges: Vec<BridgeSnapshot> },

    /// Content -> panel: one logged activity event.
    EventLog { event: EventLogEntry },

    /// Content -> panel: the inspected page has no devtools hook.
    NoHook,

    /// Broker -> panel: the tab's content side went away.
    #[serde(rename_all = "camelCase")]
    ContentDisconnected { tab_id: TabId },
}

/// Serialize a message for the wire.
pub fn encode(message: &WireMessage) -> Value {
    serde_json::to_value(message).unwrap_or_else(|error| {
        // Unreachable for this message set; routed as an ignorable null.
        tracing::error!(error = %error, "failed to encode wire message");
        Value::Null
    })
}

/// Parse a raw message, if it is one of the known kinds.
///
/// Extra fields (such as a routing `tabId` stamped onto a forwarded message)
/// are tolerated and ignored.
pub fn decode(value: &Value) -> Option<WireMessage> {
    serde_json::from_value(value.clone()).ok()
}

/// The `type` tag of a raw message.
pub fn type_of(value: &Value) -> Option<&str> {
    value.get("type")?.as_str()
}

/// The `tabId` field of a raw message envelope.
pub fn tab_id_of(value: &Value) -> Option<TabId> {
    value.get("tabId")?.as_u64().and_then(|id| id.try_into().ok())
}

/// Copy of the message with `tabId` stamped on, so a panel receiving it can
/// tell which tab it came from.
pub fn stamp_tab_id(value: &Value, tab_id: TabId) -> Value {
    let mut object = value.as_object().cloned().unwrap_or_default();
    object.insert("tabId".to_string(), Value::from(tab_id));
    Value::Object(object)
}
