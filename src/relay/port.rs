//! In-process ports connecting a relay context to the broker.
//!
//! The analog of a browser extension's persistent runtime port: a named,
//! bidirectional, FIFO channel. Posting never blocks; messages to a peer
//! that is gone are dropped. Dropping a [`PortClient`] disconnects it, the
//! page-unload analog.

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::broker::BrokerCommand;

pub type PortId = Uuid;

/// Which side of the relay a connection belongs to. The role doubles as the
/// channel name the broker dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    Panel,
    Content,
}

impl PortRole {
    pub fn channel_name(self) -> &'static str {
        match self {
            PortRole::Panel => "panel",
            PortRole::Content => "content",
        }
    }
}

/// Posting half of a port, cheap to clone.
#[derive(Debug, Clone)]
pub struct PortSender {
    id: PortId,
    commands: mpsc::UnboundedSender<BrokerCommand>,
}

impl PortSender {
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Post a message to the broker. Dropped silently if the broker or the
    /// port is gone.
    pub fn post(&self, message: Value) {
        let _ = self.commands.send(BrokerCommand::Message {
            id: self.id,
            message,
        });
    }
}

/// A live connection to the broker.
pub struct PortClient {
    sender: PortSender,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl PortClient {
    pub(crate) fn new(
        id: PortId,
        commands: mpsc::UnboundedSender<BrokerCommand>,
        rx: mpsc::UnboundedReceiver<Value>,
    ) -> Self {
        Self {
            sender: PortSender { id, commands },
            rx,
        }
    }

    pub fn id(&self) -> PortId {
        self.sender.id
    }

    /// Posting half of this port, usable independently of `recv`.
    pub fn sender(&self) -> PortSender {
        self.sender.clone()
    }

    /// Post a message to the broker.
    pub fn post(&self, message: Value) {
        self.sender.post(message);
    }

    /// Receive the next message from the broker. `None` once the broker is
    /// gone or the port was dropped broker-side.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Disconnect explicitly. Equivalent to dropping the client.
    pub fn disconnect(self) {}
}

impl Drop for PortClient {
    fn drop(&mut self) {
        let _ = self.sender.commands.send(BrokerCommand::Disconnect {
            id: self.sender.id,
        });
    }
}
