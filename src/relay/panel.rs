//! Panel connector: the inspector-side endpoint of the relay.
//!
//! Connects to the broker, binds itself to the inspected tab with an `init`
//! message, and folds incoming traffic into a local view: the current bridge
//! snapshots, the registered remotes, and a bounded newest-first event log.
//! Two flags let a UI distinguish "no broker connection" from "broker
//! connected but the page has no hook".

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::devtools::{BridgeSnapshot, EventLogEntry, RemoteInfo};

use super::broker::BrokerHandle;
use super::port::{PortClient, PortRole, PortSender};
use super::protocol::{self, TabId, WireMessage};

/// Snapshot of everything the panel currently knows.
#[derive(Debug, Clone, Default)]
pub struct PanelView {
    pub bridges: Vec<BridgeSnapshot>,
    pub remotes: Vec<RemoteInfo>,
    /// Event log, newest first, bounded by the configured capacity.
    pub events: Vec<EventLogEntry>,
    /// Whether the end-to-end connection (broker and content side) is live.
    pub connected: bool,
    /// Whether the inspected page exposes a devtools hook.
    pub has_hook: bool,
}

struct PanelState {
    bridges: Vec<BridgeSnapshot>,
    remotes: Vec<RemoteInfo>,
    events: VecDeque<EventLogEntry>,
    capacity: usize,
    connected: bool,
    has_hook: bool,
}

impl PanelState {
    fn view(&self) -> PanelView {
        PanelView {
            bridges: self.bridges.clone(),
            remotes: self.remotes.clone(),
            events: self.events.iter().cloned().collect(),
            connected: self.connected,
            has_hook: self.has_hook,
        }
    }
}

/// Inspector-side connection for one tab.
pub struct PanelConnector {
    tab_id: TabId,
    state: Arc<Mutex<PanelState>>,
    revision: watch::Receiver<u64>,
    sender: PortSender,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PanelConnector {
    /// Connect to the broker and bind to the inspected tab.
    pub fn connect(broker: &BrokerHandle, tab_id: TabId, event_log_capacity: usize) -> Self {
        let client = broker.connect(PortRole::Panel, None);
        let sender = client.sender();
        client.post(protocol::encode(&WireMessage::Init { tab_id }));

        let state = Arc::new(Mutex::new(PanelState {
            bridges: Vec::new(),
            remotes: Vec::new(),
            events: VecDeque::new(),
            capacity: event_log_capacity,
            connected: true,
            has_hook: false,
        }));
        let (revision_tx, revision_rx) = watch::channel(0u64);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(client, state.clone(), revision_tx, shutdown_rx));

        Self {
            tab_id,
            state,
            revision: revision_rx,
            sender,
            shutdown_tx,
            task,
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Current view of bridges, remotes, events, and connection flags.
    pub fn view(&self) -> PanelView {
        self.state.lock().view()
    }

    /// Watch channel bumped on every view change; a UI can await it instead
    /// of polling [`view`](PanelConnector::view).
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.revision.clone()
    }

    /// Ask the inspected tab's content side for a fresh snapshot.
    pub fn request_bridges(&self) {
        // Raw envelope: the broker forwards any panel message with an
        // explicit tabId verbatim to that tab's content port.
        self.sender.post(serde_json::json!({
            "type": "get-bridges",
            "tabId": self.tab_id,
        }));
    }

    /// Disconnect from the broker and wait for the reader task to finish.
    pub async fn disconnect(self) {
        drop(self.shutdown_tx);
        if let Err(error) = self.task.await {
            tracing::debug!(error = %error, "panel connector task ended abnormally");
        }
    }
}

async fn run(
    mut client: PortClient,
    state: Arc<Mutex<PanelState>>,
    revision: watch::Sender<u64>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            message = client.recv() => match message {
                None => {
                    // Broker gone: no connection, and nothing to know the
                    // hook through either.
                    let mut panel = state.lock();
                    panel.connected = false;
                    panel.has_hook = false;
                    drop(panel);
                    bump(&revision);
                    break;
                }
                Some(value) => {
                    if apply_message(&state, &value) {
                        bump(&revision);
                    }
                }
            },
        }
    }
    tracing::debug!("panel connector stopped");
}

fn bump(revision: &watch::Sender<u64>) {
    revision.send_modify(|rev| *rev += 1);
}

/// Fold one incoming message into the panel state. Returns whether the view
/// changed.
fn apply_message(state: &Mutex<PanelState>, value: &Value) -> bool {
    let Some(message) = protocol::decode(value) else {
        tracing::debug!(
            message_type = protocol::type_of(value).unwrap_or("<untyped>"),
            "ignoring unrecognized message"
        );
        return false;
    };

    let mut panel = state.lock();
    match message {
        WireMessage::BridgeData { bridges, remotes } => {
            panel.bridges = bridges;
            panel.remotes = remotes;
            panel.has_hook = true;
        }
        WireMessage::BridgeUpdate { bridges } => {
            panel.bridges = bridges;
            panel.has_hook = true;
        }
        WireMessage::EventLog { event } => {
            panel.events.push_front(event);
            let capacity = panel.capacity;
            panel.events.truncate(capacity);
        }
        WireMessage::NoHook => {
            panel.has_hook = false;
        }
        WireMessage::ContentDisconnected { .. } => {
            panel.connected = false;
            panel.has_hook = false;
            panel.bridges.clear();
            panel.remotes.clear();
        }
        // Outbound-only kinds; nothing to fold in.
        WireMessage::Init { .. } | WireMessage::GetBridges => return false,
    }
    true
}
