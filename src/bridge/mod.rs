// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bidirectional synchronization between MQTT topics and the accessory.
//!
//! # Architecture
//!
//! ```text
//! MQTT message ──► on_transport_message ──► StateStore ──► Accessory
//!                                                │
//!                      (button press, deferred)  └──► Transport (ack)
//!
//! accessory set ──► on_accessory_set ──► StateStore ──► Transport
//! accessory get ──► on_accessory_get ◄── StateStore
//! ```
//!
//! # Loop avoidance
//!
//! Every value the bridge publishes on the target topic comes back to it,
//! because it is subscribed to that same topic. An inbound target value
//! equal to the cached target is therefore treated as an echo and dropped.
//! Only a different value counts as a request from the device.

mod republish;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::accessory::Accessory;
use crate::protocol::Transport;
use crate::state::{BindingMode, Characteristic, StateChange, StateStore, TopicBinding};
use crate::types::{CurrentState, TargetState, parse_payload};

use republish::RepublishScheduler;

/// Delay before a button press is acknowledged on the button topic.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Keeps the accessory view of an alarm in sync with its MQTT topics.
///
/// The bridge is cheaply cloneable; clones share the same state. All
/// handlers are synchronous and never fail: malformed input is logged and
/// dropped, and publish errors are logged.
///
/// A tokio runtime must be running when a button press arrives, since the
/// acknowledgement is published from a spawned timer task.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mqtt_alarm::{CallbackRegistry, SyncBridge};
/// use mqtt_alarm::protocol::Transport;
/// use mqtt_alarm::state::{Characteristic, TopicBinding};
/// use mqtt_alarm::types::CurrentState;
///
/// struct NullTransport;
///
/// impl Transport for NullTransport {
///     fn subscribe(&self, _: &str) -> Result<(), mqtt_alarm::ProtocolError> { Ok(()) }
///     fn publish(&self, _: &str, _: &str) -> Result<(), mqtt_alarm::ProtocolError> { Ok(()) }
/// }
///
/// let bridge = SyncBridge::new(
///     TopicBinding::button_press("alarm/status", "alarm/button"),
///     NullTransport,
///     Arc::new(CallbackRegistry::new()),
/// );
///
/// assert_eq!(bridge.on_accessory_get(Characteristic::CurrentState), None);
/// bridge.on_transport_message("alarm/status", b"1");
/// assert_eq!(bridge.current_state(), Some(CurrentState::AwayArm));
/// ```
pub struct SyncBridge<T: Transport> {
    inner: Arc<BridgeInner<T>>,
}

struct BridgeInner<T> {
    store: Mutex<StateStore>,
    binding: TopicBinding,
    transport: T,
    accessory: Arc<dyn Accessory>,
    republisher: RepublishScheduler,
    debounce: Duration,
}

impl<T: Transport> SyncBridge<T> {
    /// Creates a bridge with the default debounce delay.
    #[must_use]
    pub fn new(binding: TopicBinding, transport: T, accessory: Arc<dyn Accessory>) -> Self {
        Self::with_debounce(binding, transport, accessory, DEFAULT_DEBOUNCE_DELAY)
    }

    /// Creates a bridge with a custom debounce delay.
    #[must_use]
    pub fn with_debounce(
        binding: TopicBinding,
        transport: T,
        accessory: Arc<dyn Accessory>,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                store: Mutex::new(StateStore::new()),
                binding,
                transport,
                accessory,
                republisher: RepublishScheduler::new(),
                debounce,
            }),
        }
    }

    /// Returns the topic binding.
    #[must_use]
    pub fn binding(&self) -> &TopicBinding {
        &self.inner.binding
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Returns the debounce delay used for button acknowledgements.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Subscribes the transport to every bound topic.
    ///
    /// Failures are logged; the bridge keeps working with whatever
    /// subscriptions succeeded.
    pub fn subscribe_all(&self) {
        for topic in self.inner.binding.topics() {
            if let Err(e) = self.inner.transport.subscribe(topic) {
                tracing::warn!(topic = %topic, error = %e, "Failed to subscribe");
            }
        }
    }

    // =========================================================================
    // Transport side
    // =========================================================================

    /// Handles a message received from the transport.
    ///
    /// - Current-state topic: the value is stored and pushed to the accessory
    ///   unconditionally.
    /// - Target topic: a value equal to the cached target is an echo and is
    ///   dropped. A different value is stored and pushed; in
    ///   [`BindingMode::ButtonPress`] it also becomes the current state and
    ///   is acknowledged on the same topic after the debounce delay.
    /// - Any other topic is ignored.
    ///
    /// Payloads that are not an integer in the field's range are dropped.
    pub fn on_transport_message(&self, topic: &str, payload: &[u8]) {
        let Some(field) = self.inner.binding.field_for(topic) else {
            tracing::trace!(topic = %topic, "Ignoring message on unbound topic");
            return;
        };

        let value = match parse_payload(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(topic = %topic, error = %e, "Discarding malformed payload");
                return;
            }
        };

        match field {
            Characteristic::CurrentState => self.apply_current(topic, value),
            Characteristic::TargetState => self.apply_target(topic, value),
        }
    }

    fn apply_current(&self, topic: &str, value: i64) {
        let state = match CurrentState::try_from(value) {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(topic = %topic, error = %e, "Discarding current state");
                return;
            }
        };

        let previous = self.inner.store.lock().set_current(state);
        tracing::debug!(
            topic = %topic,
            state = %state,
            previous = ?previous,
            "Current state reported by device"
        );

        self.inner
            .accessory
            .update_characteristic(&StateChange::Current(state));
    }

    fn apply_target(&self, topic: &str, value: i64) {
        let state = match TargetState::try_from(value) {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(topic = %topic, error = %e, "Discarding target state");
                return;
            }
        };

        let mode = self.inner.binding.mode();
        let changed = {
            let mut store = self.inner.store.lock();
            if store.target() == Some(state) {
                false
            } else {
                store.set_target(state);
                if mode == BindingMode::ButtonPress {
                    store.set_current(state.into());
                }
                true
            }
        };

        if !changed {
            tracing::debug!(topic = %topic, state = %state, "Ignoring echo of own target state");
            return;
        }

        tracing::info!(topic = %topic, state = %state, ?mode, "Target state changed by device");

        let accessory = &self.inner.accessory;
        accessory.update_characteristic(&StateChange::Target(state));

        if mode == BindingMode::ButtonPress {
            accessory.update_characteristic(&StateChange::Current(state.into()));
            self.schedule_acknowledgement(state);
        }
    }

    fn schedule_acknowledgement(&self, state: TargetState) {
        let inner = Arc::clone(&self.inner);
        let delay = self.inner.debounce;

        self.inner.republisher.schedule(async move {
            tokio::time::sleep(delay).await;
            inner.acknowledge(state);
        });
    }

    // =========================================================================
    // Accessory side
    // =========================================================================

    /// Returns the cached value of a characteristic.
    ///
    /// `None` means no value has been received or set yet. Never touches the
    /// transport.
    #[must_use]
    pub fn on_accessory_get(&self, characteristic: Characteristic) -> Option<u8> {
        let value = self.inner.store.lock().get(characteristic);
        tracing::debug!(%characteristic, value = ?value, "Accessory get");
        value
    }

    /// Stores a target state requested by the accessory and publishes it.
    ///
    /// Returns immediately without waiting for the device. A publish error
    /// is logged; the cached target keeps the requested value.
    pub fn on_accessory_set(&self, state: TargetState) {
        // Held until the publish is queued so a pending acknowledgement
        // cannot reach the wire after this value.
        let mut store = self.inner.store.lock();
        let previous = store.set_target(state);
        tracing::info!(state = %state, previous = ?previous, "Target state set by accessory");

        let topic = self.inner.binding.target_topic();
        if let Err(e) = self.inner.transport.publish(topic, &state.payload()) {
            tracing::warn!(topic = %topic, state = %state, error = %e, "Failed to publish target state");
        }
        drop(store);
    }

    /// Returns the cached current state.
    #[must_use]
    pub fn current_state(&self) -> Option<CurrentState> {
        self.inner.store.lock().current()
    }

    /// Returns the cached target state.
    #[must_use]
    pub fn target_state(&self) -> Option<TargetState> {
        self.inner.store.lock().target()
    }

    /// Returns a copy of the cached state.
    #[must_use]
    pub fn snapshot(&self) -> StateStore {
        *self.inner.store.lock()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns the number of acknowledgements waiting to be published.
    #[must_use]
    pub fn pending_republishes(&self) -> usize {
        self.inner.republisher.pending()
    }

    /// Abandons pending acknowledgements and stops scheduling new ones.
    ///
    /// Cached state stays readable after shutdown.
    pub fn shutdown(&self) {
        self.inner.republisher.close();
    }
}

impl<T: Transport> BridgeInner<T> {
    /// Publishes a debounced acknowledgement unless a newer target replaced it.
    fn acknowledge(&self, state: TargetState) {
        let store = self.store.lock();
        if store.target() != Some(state) {
            tracing::debug!(state = %state, "Acknowledgement superseded, not publishing");
            return;
        }

        let topic = self.binding.target_topic();
        tracing::debug!(topic = %topic, state = %state, "Acknowledging button press");
        if let Err(e) = self.transport.publish(topic, &state.payload()) {
            tracing::warn!(topic = %topic, state = %state, error = %e, "Failed to acknowledge button press");
        }
        drop(store);
    }
}

impl<T: Transport> Clone for SyncBridge<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> std::fmt::Debug for SyncBridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBridge")
            .field("binding", &self.inner.binding)
            .field("state", &*self.inner.store.lock())
            .field("debounce", &self.inner.debounce)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::subscription::CallbackRegistry;

    #[derive(Default)]
    struct RecordingTransport {
        published: Mutex<Vec<(String, String)>>,
        subscribed: Mutex<Vec<String>>,
    }

    impl Transport for RecordingTransport {
        fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
            self.subscribed.lock().push(topic.to_string());
            Ok(())
        }

        fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError> {
            self.published
                .lock()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    impl RecordingTransport {
        fn published(&self) -> Vec<(String, String)> {
            self.published.lock().clone()
        }
    }

    fn button_bridge() -> (SyncBridge<RecordingTransport>, Arc<CallbackRegistry>) {
        let registry = Arc::new(CallbackRegistry::new());
        let bridge = SyncBridge::new(
            TopicBinding::button_press("alarm/status", "alarm/button"),
            RecordingTransport::default(),
            registry.clone(),
        );
        (bridge, registry)
    }

    fn record_changes(registry: &CallbackRegistry) -> Arc<Mutex<Vec<StateChange>>> {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = Arc::clone(&changes);
        registry.on_state_changed(move |change| changes_clone.lock().push(*change));
        changes
    }

    #[test]
    fn cold_start_reads_unset() {
        let (bridge, _) = button_bridge();
        assert_eq!(bridge.on_accessory_get(Characteristic::CurrentState), None);
        assert_eq!(bridge.on_accessory_get(Characteristic::TargetState), None);
    }

    #[test]
    fn subscribe_all_binds_both_topics() {
        let (bridge, _) = button_bridge();
        bridge.subscribe_all();
        assert_eq!(
            *bridge.transport().subscribed.lock(),
            vec!["alarm/status".to_string(), "alarm/button".to_string()]
        );
    }

    #[test]
    fn accessory_set_then_get() {
        let (bridge, _) = button_bridge();
        for target in TargetState::ALL {
            bridge.on_accessory_set(target);
            assert_eq!(
                bridge.on_accessory_get(Characteristic::TargetState),
                Some(target.as_num())
            );
        }
    }

    #[test]
    fn accessory_set_publishes_verbatim_without_notifying() {
        let (bridge, registry) = button_bridge();
        let changes = record_changes(&registry);

        bridge.on_accessory_set(TargetState::Disarm);

        assert_eq!(
            bridge.transport().published(),
            vec![("alarm/button".to_string(), "3".to_string())]
        );
        assert!(changes.lock().is_empty());
        assert_eq!(bridge.current_state(), None);
    }

    #[test]
    fn current_state_is_always_applied() {
        let (bridge, registry) = button_bridge();
        let changes = record_changes(&registry);

        for state in CurrentState::ALL {
            bridge.on_transport_message("alarm/status", state.payload().as_bytes());
            assert_eq!(
                bridge.on_accessory_get(Characteristic::CurrentState),
                Some(state.as_num())
            );
        }
        // Repeating a value is still pushed.
        bridge.on_transport_message("alarm/status", b"4");

        assert_eq!(changes.lock().len(), CurrentState::ALL.len() + 1);
        assert!(bridge.transport().published().is_empty());
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let (bridge, registry) = button_bridge();
        let changes = record_changes(&registry);
        bridge.on_transport_message("alarm/status", b"1");
        bridge.on_accessory_set(TargetState::AwayArm);
        let before = bridge.snapshot();

        bridge.on_transport_message("alarm/status", b"abc");
        bridge.on_transport_message("alarm/button", b"abc");
        bridge.on_transport_message("alarm/button", b"");

        assert_eq!(bridge.snapshot(), before);
        assert_eq!(changes.lock().len(), 1);
        assert_eq!(bridge.transport().published().len(), 1);
        assert_eq!(bridge.pending_republishes(), 0);
    }

    #[test]
    fn out_of_range_values_are_dropped() {
        let (bridge, _) = button_bridge();
        bridge.on_transport_message("alarm/status", b"5");
        bridge.on_transport_message("alarm/button", b"4");
        assert_eq!(bridge.snapshot(), StateStore::new());
    }

    #[test]
    fn unbound_topic_is_ignored() {
        let (bridge, registry) = button_bridge();
        let changes = record_changes(&registry);
        bridge.on_transport_message("alarm/other", b"1");
        assert_eq!(bridge.snapshot(), StateStore::new());
        assert!(changes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn echo_of_own_set_is_absorbed() {
        let (bridge, registry) = button_bridge();
        let changes = record_changes(&registry);

        bridge.on_accessory_set(TargetState::NightArm);
        bridge.on_transport_message("alarm/button", b"2");

        tokio::time::sleep(DEFAULT_DEBOUNCE_DELAY * 2).await;
        assert_eq!(bridge.transport().published().len(), 1);
        assert!(changes.lock().is_empty());
        assert_eq!(bridge.pending_republishes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn button_press_updates_both_and_acknowledges_once() {
        let (bridge, registry) = button_bridge();
        let changes = record_changes(&registry);

        bridge.on_transport_message("alarm/button", b"1");

        assert_eq!(bridge.target_state(), Some(TargetState::AwayArm));
        assert_eq!(bridge.current_state(), Some(CurrentState::AwayArm));
        assert_eq!(
            *changes.lock(),
            vec![
                StateChange::Target(TargetState::AwayArm),
                StateChange::Current(CurrentState::AwayArm),
            ]
        );

        // Nothing is published before the debounce delay elapses.
        assert!(bridge.transport().published().is_empty());
        assert_eq!(bridge.pending_republishes(), 1);

        tokio::time::sleep(DEFAULT_DEBOUNCE_DELAY + Duration::from_millis(10)).await;
        assert_eq!(
            bridge.transport().published(),
            vec![("alarm/button".to_string(), "1".to_string())]
        );

        // The acknowledgement comes back as an echo and is absorbed.
        bridge.on_transport_message("alarm/button", b"1");
        tokio::time::sleep(DEFAULT_DEBOUNCE_DELAY * 2).await;
        assert_eq!(bridge.transport().published().len(), 1);
        assert_eq!(changes.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_acknowledgement_is_skipped() {
        let (bridge, _) = button_bridge();

        bridge.on_transport_message("alarm/button", b"0");
        bridge.on_accessory_set(TargetState::Disarm);

        tokio::time::sleep(DEFAULT_DEBOUNCE_DELAY * 2).await;
        assert_eq!(
            bridge.transport().published(),
            vec![("alarm/button".to_string(), "3".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_pending_acknowledgement() {
        let (bridge, _) = button_bridge();

        bridge.on_transport_message("alarm/button", b"2");
        bridge.shutdown();

        tokio::time::sleep(DEFAULT_DEBOUNCE_DELAY * 2).await;
        assert!(bridge.transport().published().is_empty());
        assert_eq!(bridge.target_state(), Some(TargetState::NightArm));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_debounce_delay() {
        let registry = Arc::new(CallbackRegistry::new());
        let bridge = SyncBridge::with_debounce(
            TopicBinding::button_press("s", "b"),
            RecordingTransport::default(),
            registry,
            Duration::from_secs(2),
        );

        bridge.on_transport_message("b", b"3");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(bridge.transport().published().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(bridge.transport().published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_target_mode_mirrors_without_republish() {
        let registry = Arc::new(CallbackRegistry::new());
        let changes = record_changes(&registry);
        let bridge = SyncBridge::new(
            TopicBinding::status_target("alarm/current", "alarm/target"),
            RecordingTransport::default(),
            registry,
        );

        bridge.on_transport_message("alarm/current", b"3");
        bridge.on_transport_message("alarm/target", b"1");

        assert_eq!(bridge.target_state(), Some(TargetState::AwayArm));
        assert_eq!(bridge.current_state(), Some(CurrentState::Disarmed));
        assert_eq!(
            *changes.lock(),
            vec![
                StateChange::Current(CurrentState::Disarmed),
                StateChange::Target(TargetState::AwayArm),
            ]
        );

        tokio::time::sleep(DEFAULT_DEBOUNCE_DELAY * 2).await;
        assert!(bridge.transport().published().is_empty());
        assert_eq!(bridge.pending_republishes(), 0);

        bridge.on_accessory_set(TargetState::StayArm);
        assert_eq!(
            bridge.transport().published(),
            vec![("alarm/target".to_string(), "0".to_string())]
        );
    }

    #[test]
    fn accessory_callback_may_read_bridge() {
        let registry = Arc::new(CallbackRegistry::new());
        let bridge = SyncBridge::new(
            TopicBinding::status_target("c", "t"),
            RecordingTransport::default(),
            registry.clone(),
        );

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let bridge_clone = bridge.clone();
        registry.on_current_state_changed(move |_| {
            *seen_clone.lock() = bridge_clone.on_accessory_get(Characteristic::CurrentState);
        });

        bridge.on_transport_message("c", b"4");
        assert_eq!(*seen.lock(), Some(4));
    }

    /// Transport whose first publish runs a hook before the message is queued.
    #[derive(Default)]
    struct HookedTransport {
        published: Mutex<Vec<(String, String)>>,
        hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl Transport for HookedTransport {
        fn subscribe(&self, _topic: &str) -> Result<(), ProtocolError> {
            Ok(())
        }

        fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError> {
            let hook = self.hook.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            self.published
                .lock()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    #[test]
    fn accessory_set_cannot_overtake_acknowledgement() {
        let bridge = SyncBridge::new(
            TopicBinding::button_press("b/status", "b"),
            HookedTransport::default(),
            Arc::new(CallbackRegistry::new()),
        );

        // No runtime here, so the press is applied but its ack is not scheduled.
        bridge.on_transport_message("b", b"1");
        assert_eq!(bridge.target_state(), Some(TargetState::AwayArm));

        // While the ack is being queued, another thread disarms.
        let setter = Arc::new(Mutex::new(None));
        let setter_slot = Arc::clone(&setter);
        let bridge_clone = bridge.clone();
        *bridge.transport().hook.lock() = Some(Box::new(move || {
            let handle =
                std::thread::spawn(move || bridge_clone.on_accessory_set(TargetState::Disarm));
            *setter_slot.lock() = Some(handle);
            std::thread::sleep(Duration::from_millis(50));
        }));

        bridge.inner.acknowledge(TargetState::AwayArm);
        let handle = setter.lock().take().unwrap();
        handle.join().unwrap();

        // The device receives the disarm last, matching the cache.
        assert_eq!(
            *bridge.transport().published.lock(),
            vec![
                ("b".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
        assert_eq!(bridge.target_state(), Some(TargetState::Disarm));
    }
}
