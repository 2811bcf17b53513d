//! Content relay: runs alongside the inspected page and forwards devtools
//! hook data to the broker.
//!
//! The hook may be installed after this relay starts, so detection polls: an
//! immediate check, then a fixed interval for a bounded number of attempts.
//! Once found, the relay opens its content port, subscribes to the hook's
//! bridge and event streams, and forwards every update until shut down.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::devtools::{self, DevtoolsHook};

use super::broker::BrokerHandle;
use super::port::PortRole;
use super::protocol::{self, TabId, WireMessage};

/// Spawns a content relay for one tab.
pub struct ContentRelay;

/// Handle for shutting a content relay down (the page-unload analog).
pub struct ContentRelayHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Clone, Copy)]
struct HookPoll {
    interval: std::time::Duration,
    max_attempts: u32,
}

impl ContentRelay {
    /// Start the relay task for the given tab.
    pub fn spawn(broker: BrokerHandle, tab_id: TabId, config: &Config) -> ContentRelayHandle {
        let poll = HookPoll {
            interval: config.hook_poll_interval,
            max_attempts: config.hook_poll_max_attempts,
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(broker, tab_id, poll, shutdown_rx));
        ContentRelayHandle { shutdown_tx, task }
    }
}

impl ContentRelayHandle {
    /// Unsubscribe from the hook, disconnect from the broker, and wait for
    /// the relay task to finish.
    pub async fn shutdown(self) {
        drop(self.shutdown_tx);
        if let Err(error) = self.task.await {
            tracing::debug!(error = %error, "content relay task ended abnormally");
        }
    }
}

async fn run(
    broker: BrokerHandle,
    tab_id: TabId,
    poll: HookPoll,
    mut shutdown: oneshot::Receiver<()>,
) {
    let Some(hook) = wait_for_hook(poll, &mut shutdown, devtools::devtools_hook).await else {
        return;
    };

    let mut client = broker.connect(PortRole::Content, Some(tab_id));

    // Hook callbacks fire synchronously on whichever thread mutates a
    // bridge; they hand the encoded message to this task through a channel.
    let (forward_tx, mut forward_rx) = mpsc::unbounded_channel::<Value>();
    let bridge_subscription = hook.subscribe({
        let forward = forward_tx.clone();
        move |bridges| {
            let _ = forward.send(protocol::encode(&WireMessage::BridgeUpdate {
                bridges: bridges.to_vec(),
            }));
        }
    });
    let event_subscription = hook.subscribe_events({
        let forward = forward_tx.clone();
        move |entry| {
            let _ = forward.send(protocol::encode(&WireMessage::EventLog {
                event: entry.clone(),
            }));
        }
    });

    // Initial snapshot so an already-attached panel is not left waiting for
    // the first change.
    client.post(bridge_data(&hook));
    tracing::debug!(tab_id, "content relay attached to hook");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            message = client.recv() => match message {
                None => break,
                Some(value) => {
                    if matches!(protocol::decode(&value), Some(WireMessage::GetBridges)) {
                        client.post(bridge_data(&hook));
                    }
                }
            },
            forwarded = forward_rx.recv() => match forwarded {
                None => break,
                Some(value) => client.post(value),
            },
        }
    }

    bridge_subscription.unsubscribe();
    event_subscription.unsubscribe();
    tracing::debug!(tab_id, "content relay stopped");
}

fn bridge_data(hook: &DevtoolsHook) -> Value {
    protocol::encode(&WireMessage::BridgeData {
        bridges: hook.bridges(),
        remotes: hook.remotes(),
    })
}

/// Poll for the devtools hook: immediate check, then `max_attempts` interval
/// ticks. Returns `None` when the attempts run out or shutdown fires first.
async fn wait_for_hook<F>(
    poll: HookPoll,
    shutdown: &mut oneshot::Receiver<()>,
    lookup: F,
) -> Option<Arc<DevtoolsHook>>
where
    F: Fn() -> Option<Arc<DevtoolsHook>>,
{
    if let Some(hook) = lookup() {
        return Some(hook);
    }
    for _ in 0..poll.max_attempts {
        tokio::select! {
            _ = &mut *shutdown => return None,
            _ = tokio::time::sleep(poll.interval) => {}
        }
        if let Some(hook) = lookup() {
            return Some(hook);
        }
    }
    tracing::debug!(attempts = poll.max_attempts, "devtools hook not detected, giving up");
    None
}
