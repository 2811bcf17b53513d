//! Background broker multiplexing devtools traffic between tabs and panels.
//!
//! The broker is the single owner of per-tab routing state. It runs as one
//! task over a command channel; every incoming message is handled to
//! completion before the next, so routing decisions never interleave. It is
//! payload-opaque: panel messages carrying an explicit `tabId` are forwarded
//! verbatim, content messages are stamped with their tab and passed through.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::port::{PortClient, PortId, PortRole};
use super::protocol::{self, TabId, WireMessage};

pub(crate) enum BrokerCommand {
    Connect {
        id: PortId,
        role: PortRole,
        sender_tab: Option<TabId>,
        tx: mpsc::UnboundedSender<Value>,
    },
    Message {
        id: PortId,
        message: Value,
    },
    Disconnect {
        id: PortId,
    },
    Inspect {
        reply: oneshot::Sender<Vec<ConnectionStatus>>,
    },
}

/// Which sides of a tab's connection record are currently attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub tab_id: TabId,
    pub has_panel: bool,
    pub has_content: bool,
}

/// Spawns the broker task.
pub struct Broker;

impl Broker {
    /// Start a broker and return a handle for connecting to it.
    ///
    /// The task stops once every handle (and every port sender) is dropped.
    pub fn spawn() -> BrokerHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        BrokerHandle { commands }
    }
}

/// Handle for opening ports to a running broker.
#[derive(Clone)]
pub struct BrokerHandle {
    commands: mpsc::UnboundedSender<BrokerCommand>,
}

impl BrokerHandle {
    /// Open a port to the broker.
    ///
    /// Content connections must carry the sender's tab id; a content
    /// connection without one is dropped immediately, and the returned
    /// client's channel closes. Panel connections bind to a tab with their
    /// `init` message instead.
    pub fn connect(&self, role: PortRole, sender_tab: Option<TabId>) -> PortClient {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.commands.send(BrokerCommand::Connect {
            id,
            role,
            sender_tab,
            tx,
        });
        PortClient::new(id, self.commands.clone(), rx)
    }

    /// Snapshot of the broker's connection records, sorted by tab.
    pub async fn connections(&self) -> Vec<ConnectionStatus> {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(BrokerCommand::Inspect { reply })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

async fn run(mut commands: mpsc::UnboundedReceiver<BrokerCommand>) {
    let mut broker = BrokerState::default();
    while let Some(command) = commands.recv().await {
        broker.handle(command);
    }
    tracing::debug!("broker stopped");
}

#[derive(Clone)]
struct PortLink {
    id: PortId,
    tx: mpsc::UnboundedSender<Value>,
}

impl PortLink {
    fn post(&self, message: Value) {
        let _ = self.tx.send(message);
    }
}

#[derive(Default)]
struct Connection {
    devtools_port: Option<PortLink>,
    content_port: Option<PortLink>,
}

struct PortInfo {
    role: PortRole,
    tab: Option<TabId>,
    tx: mpsc::UnboundedSender<Value>,
}

#[derive(Default)]
struct BrokerState {
    /// One record per inspected tab, alive while at least one side is
    /// connected.
    connections: HashMap<TabId, Connection>,
    ports: HashMap<PortId, PortInfo>,
}

impl BrokerState {
    fn handle(&mut self, command: BrokerCommand) {
        match command {
            BrokerCommand::Connect {
                id,
                role,
                sender_tab,
                tx,
            } => self.handle_connect(id, role, sender_tab, tx),
            BrokerCommand::Message { id, message } => self.handle_message(id, message),
            BrokerCommand::Disconnect { id } => self.handle_disconnect(id),
            BrokerCommand::Inspect { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn handle_connect(
        &mut self,
        id: PortId,
        role: PortRole,
        sender_tab: Option<TabId>,
        tx: mpsc::UnboundedSender<Value>,
    ) {
        match role {
            PortRole::Panel => {
                self.ports.insert(id, PortInfo { role, tab: None, tx });
                tracing::debug!(port = %id, channel = role.channel_name(), "port opened");
            }
            PortRole::Content => {
                let Some(tab_id) = sender_tab else {
                    tracing::warn!(port = %id, "content connection without a sender tab, dropping");
                    return;
                };
                self.ports.insert(
                    id,
                    PortInfo {
                        role,
                        tab: Some(tab_id),
                        tx: tx.clone(),
                    },
                );
                let connection = self.connections.entry(tab_id).or_default();
                connection.content_port = Some(PortLink { id, tx });
                tracing::debug!(tab_id, port = %id, channel = role.channel_name(), "port opened");
            }
        }
    }

    fn handle_message(&mut self, id: PortId, message: Value) {
        let Some(port) = self.ports.get(&id) else {
            return;
        };
        match port.role {
            PortRole::Panel => self.handle_panel_message(id, message),
            PortRole::Content => self.handle_content_message(id, message),
        }
    }

    fn handle_panel_message(&mut self, id: PortId, message: Value) {
        let tab_id = protocol::tab_id_of(&message);

        if protocol::type_of(&message) == Some("init") {
            let Some(tab_id) = tab_id else {
                return;
            };
            let Some(port) = self.ports.get_mut(&id) else {
                return;
            };
            port.tab = Some(tab_id);
            let tx = port.tx.clone();
            let connection = self.connections.entry(tab_id).or_default();
            connection.devtools_port = Some(PortLink { id, tx });
            tracing::debug!(tab_id, port = %id, "panel connected");

            // A content side may already be attached; ask it for a fresh
            // snapshot so a late-joining panel does not start out stale.
            if let Some(content) = &connection.content_port {
                content.post(protocol::encode(&WireMessage::GetBridges));
            }
            return;
        }

        // Any other panel message carrying an explicit tab id is forwarded
        // verbatim to that tab's content side, if present.
        if let (Some(tab_id), Some(_)) = (tab_id, protocol::type_of(&message)) {
            if let Some(content) = self
                .connections
                .get(&tab_id)
                .and_then(|connection| connection.content_port.as_ref())
            {
                content.post(message);
            }
        }
    }

    fn handle_content_message(&mut self, id: PortId, message: Value) {
        let Some(tab_id) = self.ports.get(&id).and_then(|port| port.tab) else {
            return;
        };
        if let Some(devtools) = self
            .connections
            .get(&tab_id)
            .and_then(|connection| connection.devtools_port.as_ref())
        {
            devtools.post(protocol::stamp_tab_id(&message, tab_id));
        }
    }

    fn handle_disconnect(&mut self, id: PortId) {
        let Some(port) = self.ports.remove(&id) else {
            return;
        };
        let mut emptied = Vec::new();
        match port.role {
            PortRole::Panel => {
                for (tab_id, connection) in self.connections.iter_mut() {
                    if connection
                        .devtools_port
                        .as_ref()
                        .is_some_and(|link| link.id == id)
                    {
                        connection.devtools_port = None;
                        if connection.content_port.is_none() {
                            emptied.push(*tab_id);
                        }
                    }
                }
            }
            PortRole::Content => {
                for (tab_id, connection) in self.connections.iter_mut() {
                    if connection
                        .content_port
                        .as_ref()
                        .is_some_and(|link| link.id == id)
                    {
                        connection.content_port = None;
                        match &connection.devtools_port {
                            None => emptied.push(*tab_id),
                            Some(devtools) => devtools.post(protocol::encode(
                                &WireMessage::ContentDisconnected { tab_id: *tab_id },
                            )),
                        }
                    }
                }
            }
        }
        for tab_id in emptied {
            self.connections.remove(&tab_id);
            tracing::debug!(tab_id, "connection record removed");
        }
    }

    fn status(&self) -> Vec<ConnectionStatus> {
        let mut statuses: Vec<ConnectionStatus> = self
            .connections
            .iter()
            .map(|(tab_id, connection)| ConnectionStatus {
                tab_id: *tab_id,
                has_panel: connection.devtools_port.is_some(),
                has_content: connection.content_port.is_some(),
            })
            .collect();
        statuses.sort_by_key(|status| status.tab_id);
        statuses
    }
}
