//! Cross-fragment state synchronization with live devtools observability.
//!
//! Independently deployed UI fragments share state through [`Bridge`]s
//! (schema-validated, observable containers) and exchange one-off signals
//! over an [`EventBus`]. When devtools integration is enabled, every bridge
//! and every emitted event is mirrored to a process-wide hook, and the
//! [`relay`] carries that data across context boundaries to an inspector
//! panel, keyed by tab.

pub mod bridge;
pub mod bus;
pub mod config;
pub mod devtools;
pub mod relay;
pub mod store;
mod subscription;
pub mod util;

pub use bridge::{Bridge, BridgeConfig, BridgeError, Schema, SchemaError, SchemaIssue, TypedSchema};
pub use bus::EventBus;
pub use config::Config;
pub use devtools::{
    devtools_enabled, devtools_hook, enable_devtools, BridgeSnapshot, DevtoolsHook, EventLogEntry,
    EventRecord, RemoteInfo,
};
pub use relay::{
    Broker, BrokerHandle, ConnectionStatus, ContentRelay, ContentRelayHandle, PanelConnector,
    PanelView, PortRole, TabId, WireMessage,
};
pub use store::KeyValueStore;
pub use subscription::Subscription;
