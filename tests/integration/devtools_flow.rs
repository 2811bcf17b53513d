//! Integration tests for the devtools hook
//!
//! The hook is process-wide and never torn down, so these tests hold the
//! shared guard, use unique namespaces, and filter the event stream by
//! namespace instead of asserting on the whole log.

use std::sync::Arc;

use serde_json::json;

use statewire::{
    devtools_enabled, devtools_hook, enable_devtools, Bridge, BridgeConfig, BridgeError,
    BridgeSnapshot, EventBus, EventLogEntry, EventRecord, RemoteInfo,
};

use super::common::{cart_bridge, cart_schema, unique_namespace, Capture, HOOK_TEST_GUARD};

fn snapshot_for<'a>(bridges: &'a [BridgeSnapshot], namespace: &str) -> Option<&'a BridgeSnapshot> {
    bridges.iter().find(|bridge| bridge.namespace == namespace)
}

fn entries_for(entries: &[EventLogEntry], namespace: &str) -> Vec<EventLogEntry> {
    entries
        .iter()
        .filter(|entry| match &entry.record {
            EventRecord::StateChange { namespace: ns, .. } => ns == namespace,
            EventRecord::Action { namespace: ns, .. } => ns == namespace,
            EventRecord::Event { .. } => false,
        })
        .cloned()
        .collect()
}

#[test]
fn test_enable_devtools_is_idempotent() {
    let _guard = HOOK_TEST_GUARD.lock();
    let first = enable_devtools();
    let second = enable_devtools();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(devtools_enabled());
    assert!(devtools_hook().is_some());
}

#[test]
fn test_bridge_registers_and_unregisters() {
    let _guard = HOOK_TEST_GUARD.lock();
    let hook = enable_devtools();

    let registry_updates: Capture<Vec<BridgeSnapshot>> = Capture::new();
    let sub = hook.subscribe({
        let updates = registry_updates.clone();
        move |bridges| updates.push(bridges.to_vec())
    });

    let bridge = cart_bridge("hook-reg");
    let namespace = bridge.namespace().to_string();

    let registered = snapshot_for(&hook.bridges(), &namespace)
        .cloned()
        .expect("bridge should be registered");
    assert_eq!(registered.state, json!({"items": [], "total": 0.0}));
    assert_eq!(registered.action_count, 0);

    // Registration notified subscribers with a snapshot containing the
    // bridge.
    assert!(registry_updates
        .items()
        .iter()
        .any(|update| snapshot_for(update, &namespace).is_some()));

    let updates_before_destroy = registry_updates.len();
    bridge.destroy().unwrap();
    assert!(snapshot_for(&hook.bridges(), &namespace).is_none());

    // Unregistration re-notified subscribers.
    assert!(registry_updates.len() > updates_before_destroy);

    sub.unsubscribe();
}

#[test]
fn test_state_change_is_logged_and_snapshotted() {
    let _guard = HOOK_TEST_GUARD.lock();
    let hook = enable_devtools();

    let events: Capture<EventLogEntry> = Capture::new();
    let sub = hook.subscribe_events({
        let events = events.clone();
        move |entry| events.push(entry.clone())
    });

    let bridge = cart_bridge("hook-state");
    let namespace = bridge.namespace().to_string();

    let mut patch = serde_json::Map::new();
    patch.insert("total".to_string(), json!(50.0));
    bridge.set_state(patch).unwrap();

    let ours = entries_for(&events.items(), &namespace);
    assert_eq!(ours.len(), 1);
    match &ours[0].record {
        EventRecord::StateChange {
            prev_state,
            new_state,
            ..
        } => {
            assert_eq!(prev_state["total"], json!(0.0));
            assert_eq!(new_state["total"], json!(50.0));
        }
        other => panic!("expected a state-change entry, got {:?}", other),
    }

    // The registry view reflects the committed state.
    let snapshot = snapshot_for(&hook.bridges(), &namespace).cloned().unwrap();
    assert_eq!(snapshot.state["total"], json!(50.0));

    bridge.destroy().unwrap();
    sub.unsubscribe();
}

#[test]
fn test_dispatch_is_logged_and_counted() {
    let _guard = HOOK_TEST_GUARD.lock();
    let hook = enable_devtools();

    let events: Capture<EventLogEntry> = Capture::new();
    let sub = hook.subscribe_events({
        let events = events.clone();
        move |entry| events.push(entry.clone())
    });

    let bridge = cart_bridge("hook-action");
    let namespace = bridge.namespace().to_string();

    bridge
        .dispatch("ADD_ITEM", Some(json!({"id": "1"})))
        .unwrap();
    bridge.dispatch("CLEAR", None).unwrap();

    let ours = entries_for(&events.items(), &namespace);
    assert_eq!(ours.len(), 2);
    match &ours[0].record {
        EventRecord::Action {
            action, payload, ..
        } => {
            assert_eq!(action, "ADD_ITEM");
            assert_eq!(payload, &Some(json!({"id": "1"})));
        }
        other => panic!("expected an action entry, got {:?}", other),
    }
    match &ours[1].record {
        EventRecord::Action { action, payload, .. } => {
            assert_eq!(action, "CLEAR");
            assert_eq!(payload, &None);
        }
        other => panic!("expected an action entry, got {:?}", other),
    }

    let snapshot = snapshot_for(&hook.bridges(), &namespace).cloned().unwrap();
    assert_eq!(snapshot.action_count, 2);

    bridge.destroy().unwrap();
    sub.unsubscribe();
}

#[test]
fn test_bus_emissions_are_mirrored() {
    let _guard = HOOK_TEST_GUARD.lock();
    let hook = enable_devtools();

    let events: Capture<EventLogEntry> = Capture::new();
    let sub = hook.subscribe_events({
        let events = events.clone();
        move |entry| events.push(entry.clone())
    });

    let marker = unique_namespace("bus-event");
    let bus = EventBus::new();
    bus.emit(&marker, Some(json!({"who": "ada"})));

    let ours: Vec<EventLogEntry> = events
        .items()
        .into_iter()
        .filter(|entry| {
            matches!(&entry.record, EventRecord::Event { event, .. } if event == &marker)
        })
        .collect();
    assert_eq!(ours.len(), 1);
    match &ours[0].record {
        EventRecord::Event { payload, .. } => {
            assert_eq!(payload, &Some(json!({"who": "ada"})));
        }
        other => panic!("expected an event entry, got {:?}", other),
    }

    sub.unsubscribe();
}

#[test]
fn test_event_ids_increase_across_kinds() {
    let _guard = HOOK_TEST_GUARD.lock();
    let hook = enable_devtools();

    let events: Capture<EventLogEntry> = Capture::new();
    let sub = hook.subscribe_events({
        let events = events.clone();
        move |entry| events.push(entry.clone())
    });

    let bridge = cart_bridge("hook-ids");
    let namespace = bridge.namespace().to_string();
    let marker = unique_namespace("ids");

    let mut patch = serde_json::Map::new();
    patch.insert("total".to_string(), json!(1.0));
    bridge.set_state(patch).unwrap();
    bridge.dispatch("TICK", None).unwrap();
    EventBus::new().emit(&marker, None);

    // Other tests may log concurrently; only this test's entries have a
    // guaranteed capture order.
    let ids: Vec<u64> = events
        .items()
        .iter()
        .filter(|entry| match &entry.record {
            EventRecord::StateChange { namespace: ns, .. } => ns == &namespace,
            EventRecord::Action { namespace: ns, .. } => ns == &namespace,
            EventRecord::Event { event, .. } => event == &marker,
        })
        .map(|entry| entry.id)
        .collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    bridge.destroy().unwrap();
    sub.unsubscribe();
}

#[test]
fn test_duplicate_namespace_is_rejected_while_live() {
    let _guard = HOOK_TEST_GUARD.lock();
    enable_devtools();

    let namespace = unique_namespace("hook-dup");
    let first = Bridge::new(BridgeConfig::new(namespace.clone(), cart_schema())).unwrap();

    let second = Bridge::new(BridgeConfig::new(namespace.clone(), cart_schema()));
    assert!(matches!(
        second,
        Err(BridgeError::DuplicateNamespace { .. })
    ));

    // After the first bridge is destroyed the namespace is free again.
    first.destroy().unwrap();
    let third = Bridge::new(BridgeConfig::new(namespace, cart_schema())).unwrap();
    third.destroy().unwrap();
}

#[test]
fn test_event_subscription_can_be_revoked() {
    let _guard = HOOK_TEST_GUARD.lock();
    let hook = enable_devtools();

    let events: Capture<EventLogEntry> = Capture::new();
    let sub = hook.subscribe_events({
        let events = events.clone();
        move |entry| events.push(entry.clone())
    });

    let marker = unique_namespace("revoked");
    sub.unsubscribe();
    EventBus::new().emit(&marker, None);

    assert!(events
        .items()
        .iter()
        .all(|entry| !matches!(&entry.record, EventRecord::Event { event, .. } if event == &marker)));
}

#[test]
fn test_remote_registry_overwrites_by_name() {
    let _guard = HOOK_TEST_GUARD.lock();
    let hook = enable_devtools();

    let name = unique_namespace("remote");
    hook.register_remote(RemoteInfo {
        name: name.clone(),
        url: "http://localhost:5001/remoteEntry.js".to_string(),
        loaded: false,
    });
    hook.register_remote(RemoteInfo {
        name: name.clone(),
        url: "http://localhost:5001/remoteEntry.js".to_string(),
        loaded: true,
    });

    let remotes = hook.remotes();
    let ours: Vec<&RemoteInfo> = remotes.iter().filter(|remote| remote.name == name).collect();
    assert_eq!(ours.len(), 1);
    assert!(ours[0].loaded);
}
