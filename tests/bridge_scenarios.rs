// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end bridge behavior against an in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;

use mqtt_alarm::protocol::Transport;
use mqtt_alarm::{
    CallbackRegistry, Characteristic, CurrentState, DEFAULT_DEBOUNCE_DELAY, ProtocolError,
    StateChange, SyncBridge, TargetState, TopicBinding,
};

/// Transport that records every publish.
#[derive(Default)]
struct MemoryTransport {
    published: Mutex<Vec<(String, String)>>,
}

impl MemoryTransport {
    fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }
}

impl Transport for MemoryTransport {
    fn subscribe(&self, _topic: &str) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError> {
        self.published
            .lock()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

struct Harness {
    bridge: SyncBridge<MemoryTransport>,
    changes: Arc<Mutex<Vec<StateChange>>>,
}

impl Harness {
    fn new(binding: TopicBinding) -> Self {
        let registry = Arc::new(CallbackRegistry::new());
        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = Arc::clone(&changes);
        registry.on_state_changed(move |change| changes_clone.lock().push(*change));

        Self {
            bridge: SyncBridge::new(binding, MemoryTransport::default(), registry),
            changes,
        }
    }

    fn button() -> Self {
        Self::new(TopicBinding::button_press("alarm/status", "alarm/button"))
    }

    fn published(&self) -> Vec<(String, String)> {
        self.bridge.transport().published()
    }

    fn change_count(&self) -> usize {
        self.changes.lock().len()
    }
}

// ============================================================================
// Cache properties
// ============================================================================

mod cache {
    use super::*;

    #[test]
    fn accessory_set_is_readable_for_every_target() {
        let harness = Harness::button();
        for state in TargetState::ALL {
            harness.bridge.on_accessory_set(state);
            assert_eq!(
                harness.bridge.on_accessory_get(Characteristic::TargetState),
                Some(state.as_num())
            );
        }
    }

    #[test]
    fn reported_current_is_readable_for_every_value() {
        let harness = Harness::button();
        for state in CurrentState::ALL {
            harness
                .bridge
                .on_transport_message("alarm/status", state.payload().as_bytes());
            assert_eq!(
                harness.bridge.on_accessory_get(Characteristic::CurrentState),
                Some(state.as_num())
            );
        }
        assert_eq!(harness.change_count(), CurrentState::ALL.len());
    }

    #[test]
    fn cold_start_is_unset() {
        let harness = Harness::button();
        assert_eq!(harness.bridge.on_accessory_get(Characteristic::CurrentState), None);
        assert_eq!(harness.bridge.on_accessory_get(Characteristic::TargetState), None);
        assert!(harness.published().is_empty());
    }

    #[test]
    fn malformed_payloads_change_nothing() {
        let harness = Harness::button();
        harness.bridge.on_transport_message("alarm/status", b"2");
        harness.bridge.on_accessory_set(TargetState::NightArm);
        let before = harness.bridge.snapshot();
        let published = harness.published().len();

        for topic in ["alarm/status", "alarm/button"] {
            for payload in [&b"abc"[..], b"", b"1.5", b"-1", b"9"] {
                harness.bridge.on_transport_message(topic, payload);
            }
        }

        assert_eq!(harness.bridge.snapshot(), before);
        assert_eq!(harness.published().len(), published);
        assert_eq!(harness.change_count(), 1);
    }
}

// ============================================================================
// Loop avoidance
// ============================================================================

mod loop_avoidance {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn echo_is_absorbed() {
        let harness = Harness::button();
        harness.bridge.on_accessory_set(TargetState::AwayArm);
        harness.bridge.on_transport_message("alarm/button", b"1");

        sleep(DEFAULT_DEBOUNCE_DELAY * 2).await;

        assert_eq!(
            harness.published(),
            vec![("alarm/button".to_string(), "1".to_string())]
        );
        assert_eq!(harness.change_count(), 0);
        assert_eq!(harness.bridge.pending_republishes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn divergent_button_press_is_acknowledged_once() {
        let harness = Harness::button();
        harness.bridge.on_accessory_set(TargetState::AwayArm);
        harness.bridge.on_transport_message("alarm/button", b"3");

        assert_eq!(harness.bridge.target_state(), Some(TargetState::Disarm));
        assert_eq!(harness.bridge.current_state(), Some(CurrentState::Disarmed));
        assert_eq!(harness.bridge.pending_republishes(), 1);

        // Nothing goes out before the delay elapses.
        sleep(DEFAULT_DEBOUNCE_DELAY / 2).await;
        assert_eq!(harness.published().len(), 1);

        sleep(DEFAULT_DEBOUNCE_DELAY).await;
        assert_eq!(
            harness.published(),
            vec![
                ("alarm/button".to_string(), "1".to_string()),
                ("alarm/button".to_string(), "3".to_string()),
            ]
        );

        // The acknowledgement comes back and is absorbed.
        harness.bridge.on_transport_message("alarm/button", b"3");
        sleep(DEFAULT_DEBOUNCE_DELAY * 2).await;
        assert_eq!(harness.published().len(), 2);
        assert_eq!(
            *harness.changes.lock(),
            vec![
                StateChange::Target(TargetState::Disarm),
                StateChange::Current(CurrentState::Disarmed),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn status_target_mode_never_republishes() {
        let harness = Harness::new(TopicBinding::status_target("alarm/status", "alarm/target"));
        harness.bridge.on_transport_message("alarm/target", b"0");
        harness.bridge.on_transport_message("alarm/status", b"0");

        sleep(DEFAULT_DEBOUNCE_DELAY * 2).await;

        assert!(harness.published().is_empty());
        assert_eq!(harness.bridge.target_state(), Some(TargetState::StayArm));
        assert_eq!(harness.bridge.current_state(), Some(CurrentState::StayArm));
    }
}

// ============================================================================
// Reference scenario
// ============================================================================

#[tokio::test(start_paused = true)]
async fn status_then_disarm_then_echo() {
    let harness = Harness::button();

    harness.bridge.on_transport_message("alarm/status", b"1");
    assert_eq!(harness.bridge.current_state(), Some(CurrentState::AwayArm));

    harness.bridge.on_accessory_set(TargetState::Disarm);
    assert_eq!(harness.bridge.on_accessory_get(Characteristic::TargetState), Some(3));
    assert_eq!(
        harness.published(),
        vec![("alarm/button".to_string(), "3".to_string())]
    );

    let before = harness.bridge.snapshot();
    harness.bridge.on_transport_message("alarm/button", b"3");
    sleep(Duration::from_secs(2)).await;

    assert_eq!(harness.published().len(), 1);
    assert_eq!(harness.bridge.snapshot(), before);
    assert_eq!(
        *harness.changes.lock(),
        vec![StateChange::Current(CurrentState::AwayArm)]
    );
}
