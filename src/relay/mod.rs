//! Message relay between the inspected page, the broker, and the inspector
//! panel.
//!
//! The three contexts share no memory: each is an independent actor talking
//! over named, FIFO ports. The broker owns all per-tab routing state;
//! content relays and panel connectors attach and detach independently and
//! survive each other's disconnects.

pub mod broker;
pub mod content;
pub mod panel;
pub mod port;
pub mod protocol;

pub use broker::{Broker, BrokerHandle, ConnectionStatus};
pub use content::{ContentRelay, ContentRelayHandle};
pub use panel::{PanelConnector, PanelView};
pub use port::{PortClient, PortId, PortRole, PortSender};
pub use protocol::{TabId, WireMessage};
