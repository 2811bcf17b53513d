//! Integration tests for the bridge lifecycle
//!
//! Covers creation, validated updates, the three subscription granularities,
//! action dispatch, and the one-way destroy transition.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use statewire::{Bridge, BridgeConfig, BridgeError, TypedSchema};

use super::common::{cart_bridge, cart_schema, unique_namespace, Capture};

fn patch(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[test]
fn test_create_with_initial_state() {
    let bridge = cart_bridge("create");
    assert_eq!(
        bridge.state().unwrap(),
        json!({"items": [], "total": 0.0})
    );
}

#[test]
fn test_create_rejects_invalid_initial_state() {
    let result = Bridge::new(
        BridgeConfig::new(unique_namespace("create-bad"), cart_schema())
            .with_initial_state(json!({"items": "not an array", "total": 0.0})),
    );
    assert!(matches!(result, Err(BridgeError::Validation { .. })));
}

#[test]
fn test_create_without_initial_state_uses_schema_defaults() {
    let bridge = Bridge::new(BridgeConfig::new(
        unique_namespace("create-default"),
        cart_schema(),
    ))
    .unwrap();
    assert_eq!(
        bridge.state().unwrap(),
        json!({"items": [], "total": 0.0})
    );
}

#[test]
fn test_set_state_merges_partial_update() {
    let bridge = cart_bridge("merge");
    bridge.set_state(patch(&[("total", json!(100.0))])).unwrap();

    let state = bridge.state().unwrap();
    assert_eq!(state["total"], json!(100.0));
    assert_eq!(state["items"], json!([]));
}

#[test]
fn test_set_state_with_function_of_previous_state() {
    let bridge = cart_bridge("updater");
    bridge.set_state(patch(&[("total", json!(50.0))])).unwrap();
    bridge
        .set_state_with(|prev| {
            let total = prev["total"].as_f64().unwrap_or(0.0);
            patch(&[("total", json!(total + 25.0))])
        })
        .unwrap();

    assert_eq!(bridge.state().unwrap()["total"], json!(75.0));
}

#[test]
fn test_invalid_update_is_rejected_atomically() {
    let bridge = cart_bridge("atomic");
    let listener_calls = Capture::new();
    let _sub = bridge
        .subscribe({
            let calls = listener_calls.clone();
            move |_, _| calls.push(())
        })
        .unwrap();

    let result = bridge.set_state(patch(&[("total", json!("not a number"))]));

    assert!(matches!(result, Err(BridgeError::Validation { .. })));
    assert_eq!(bridge.state().unwrap()["total"], json!(0.0));
    assert!(listener_calls.is_empty());
}

#[test]
fn test_subscribe_receives_new_and_previous_state() {
    let bridge = cart_bridge("subscribe");
    let seen = Capture::new();
    let _sub = bridge
        .subscribe({
            let seen = seen.clone();
            move |state, prev| seen.push((state.clone(), prev.clone()))
        })
        .unwrap();

    bridge.set_state(patch(&[("total", json!(50.0))])).unwrap();

    let calls = seen.items();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, json!({"items": [], "total": 50.0}));
    assert_eq!(calls[0].1, json!({"items": [], "total": 0.0}));
}

#[test]
fn test_unsubscribe_stops_exactly_that_listener() {
    let bridge = cart_bridge("unsub");
    let seen_a = Capture::new();
    let seen_b = Capture::new();
    let sub_a = bridge
        .subscribe({
            let seen = seen_a.clone();
            move |_, _| seen.push(())
        })
        .unwrap();
    let _sub_b = bridge
        .subscribe({
            let seen = seen_b.clone();
            move |_, _| seen.push(())
        })
        .unwrap();

    bridge.set_state(patch(&[("total", json!(1.0))])).unwrap();
    sub_a.unsubscribe();
    bridge.set_state(patch(&[("total", json!(2.0))])).unwrap();

    assert_eq!(seen_a.len(), 1);
    assert_eq!(seen_b.len(), 2);
}

#[test]
fn test_subscribe_key_fires_on_change_with_values() {
    let bridge = cart_bridge("key");
    let seen = Capture::new();
    let _sub = bridge
        .subscribe_key("total", {
            let seen = seen.clone();
            move |value, prev| seen.push((value.clone(), prev.clone()))
        })
        .unwrap();

    bridge.set_state(patch(&[("total", json!(100.0))])).unwrap();

    assert_eq!(seen.items(), vec![(json!(100.0), json!(0.0))]);
}

#[test]
fn test_subscribe_key_silent_when_key_unchanged() {
    let bridge = cart_bridge("key-quiet");
    let total_seen = Capture::new();
    let _sub = bridge
        .subscribe_key("total", {
            let seen = total_seen.clone();
            move |_, _| seen.push(())
        })
        .unwrap();

    bridge
        .set_state(patch(&[(
            "items",
            json!([{"id": "1", "quantity": 1}]),
        )]))
        .unwrap();

    assert!(total_seen.is_empty());
}

#[test]
fn test_subscribe_key_unsubscribe_keeps_sibling() {
    let bridge = cart_bridge("key-unsub");
    let seen_a = Capture::new();
    let seen_b = Capture::new();
    let sub_a = bridge
        .subscribe_key("total", {
            let seen = seen_a.clone();
            move |_, _| seen.push(())
        })
        .unwrap();
    let _sub_b = bridge
        .subscribe_key("total", {
            let seen = seen_b.clone();
            move |_, _| seen.push(())
        })
        .unwrap();

    sub_a.unsubscribe();
    bridge.set_state(patch(&[("total", json!(100.0))])).unwrap();

    assert!(seen_a.is_empty());
    assert_eq!(seen_b.len(), 1);
}

#[test]
fn test_dispatch_reaches_every_handler_with_payload() {
    let bridge = cart_bridge("dispatch");
    let seen_a = Capture::new();
    let seen_b = Capture::new();
    let _a = bridge
        .on_action("ADD_ITEM", {
            let seen = seen_a.clone();
            move |payload| seen.push(payload.clone())
        })
        .unwrap();
    let _b = bridge
        .on_action("ADD_ITEM", {
            let seen = seen_b.clone();
            move |payload| seen.push(payload.clone())
        })
        .unwrap();

    let payload = json!({"id": "1", "quantity": 2});
    bridge.dispatch("ADD_ITEM", Some(payload.clone())).unwrap();

    assert_eq!(seen_a.items(), vec![payload.clone()]);
    assert_eq!(seen_b.items(), vec![payload]);
    assert_eq!(bridge.action_count(), 1);
}

#[test]
fn test_dispatch_without_handlers_is_a_no_op() {
    let bridge = cart_bridge("dispatch-empty");
    bridge.dispatch("NOBODY_LISTENS", None).unwrap();
    assert_eq!(bridge.action_count(), 1);
}

#[test]
fn test_on_action_unsubscribe_stops_delivery() {
    let bridge = cart_bridge("action-unsub");
    let seen = Capture::new();
    let sub = bridge
        .on_action("PING", {
            let seen = seen.clone();
            move |_| seen.push(())
        })
        .unwrap();

    bridge.dispatch("PING", None).unwrap();
    sub.unsubscribe();
    bridge.dispatch("PING", None).unwrap();

    assert_eq!(seen.len(), 1);
}

#[test]
fn test_every_operation_fails_after_destroy() {
    let bridge = cart_bridge("destroy");
    bridge.destroy().unwrap();

    assert!(matches!(bridge.state(), Err(BridgeError::Destroyed { .. })));
    assert!(matches!(
        bridge.set_state(patch(&[("total", json!(1.0))])),
        Err(BridgeError::Destroyed { .. })
    ));
    assert!(matches!(
        bridge.set_state_with(|_| Map::new()),
        Err(BridgeError::Destroyed { .. })
    ));
    assert!(matches!(
        bridge.subscribe(|_, _| {}),
        Err(BridgeError::Destroyed { .. })
    ));
    assert!(matches!(
        bridge.subscribe_key("total", |_, _| {}),
        Err(BridgeError::Destroyed { .. })
    ));
    assert!(matches!(
        bridge.dispatch("X", None),
        Err(BridgeError::Destroyed { .. })
    ));
    assert!(matches!(
        bridge.on_action("X", |_| {}),
        Err(BridgeError::Destroyed { .. })
    ));
    // Destruction is not idempotent.
    assert!(matches!(
        bridge.destroy(),
        Err(BridgeError::Destroyed { .. })
    ));
    assert!(bridge.is_destroyed());
}

#[test]
fn test_destroyed_listeners_are_gone() {
    let bridge = cart_bridge("destroy-clears");
    let seen = Capture::new();
    let sub = bridge
        .subscribe({
            let seen = seen.clone();
            move |_, _| seen.push(())
        })
        .unwrap();

    bridge.destroy().unwrap();
    // Unsubscribing after destroy finds nothing to remove and must not panic.
    sub.unsubscribe();
    assert!(seen.is_empty());
}

#[test]
fn test_panicking_listener_does_not_block_siblings_or_mutation() {
    let bridge = cart_bridge("panic");
    let seen = Capture::new();
    let _bad = bridge.subscribe(|_, _| panic!("listener error")).unwrap();
    let _good = bridge
        .subscribe({
            let seen = seen.clone();
            move |_, _| seen.push(())
        })
        .unwrap();

    bridge.set_state(patch(&[("total", json!(5.0))])).unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(bridge.state().unwrap()["total"], json!(5.0));
}

#[test]
fn test_panicking_action_handler_does_not_block_siblings() {
    let bridge = cart_bridge("panic-action");
    let seen = Capture::new();
    let _bad = bridge
        .on_action("GO", |_| panic!("handler error"))
        .unwrap();
    let _good = bridge
        .on_action("GO", {
            let seen = seen.clone();
            move |_| seen.push(())
        })
        .unwrap();

    bridge.dispatch("GO", Some(json!("data"))).unwrap();
    assert_eq!(seen.len(), 1);
}

#[test]
fn test_clones_share_the_same_container() {
    let bridge = cart_bridge("clone");
    let clone = bridge.clone();

    clone.set_state(patch(&[("total", json!(9.0))])).unwrap();
    assert_eq!(bridge.state().unwrap()["total"], json!(9.0));

    bridge.destroy().unwrap();
    assert!(clone.is_destroyed());
}

mod merge_properties {
    use super::*;
    use proptest::prelude::*;

    fn open_bridge(prev: &HashMap<String, i64>) -> Bridge {
        Bridge::new(
            BridgeConfig::new(
                unique_namespace("prop"),
                Arc::new(TypedSchema::<HashMap<String, i64>>::new()),
            )
            .with_initial_state(serde_json::to_value(prev).unwrap()),
        )
        .unwrap()
    }

    proptest! {
        /// For all valid partial updates, the new state is the shallow merge
        /// of the previous state and the update.
        #[test]
        fn merge_applies_every_update(
            prev in proptest::collection::hash_map("[a-e]", any::<i64>(), 0..5),
            update in proptest::collection::hash_map("[a-e]", any::<i64>(), 0..5),
        ) {
            let bridge = open_bridge(&prev);
            let update_patch: Map<String, Value> = update
                .iter()
                .map(|(key, value)| (key.clone(), json!(*value)))
                .collect();
            bridge.set_state(update_patch).unwrap();

            let mut expected = prev.clone();
            expected.extend(update.clone());
            prop_assert_eq!(
                bridge.state().unwrap(),
                serde_json::to_value(&expected).unwrap()
            );
            bridge.destroy().unwrap();
        }

        /// A rejected update leaves the state bit-for-bit unchanged.
        #[test]
        fn rejected_update_changes_nothing(
            prev in proptest::collection::hash_map("[a-e]", any::<i64>(), 0..5),
            bad_key in "[a-e]",
        ) {
            let bridge = open_bridge(&prev);
            let before = bridge.state().unwrap();

            let mut update = Map::new();
            update.insert(bad_key, json!("not a number"));
            prop_assert!(bridge.set_state(update).is_err());

            prop_assert_eq!(bridge.state().unwrap(), before);
            bridge.destroy().unwrap();
        }
    }
}
