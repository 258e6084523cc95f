// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A running alarm accessory connected to its broker.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::accessory::{Accessory, AccessoryInformation};
use crate::bridge::SyncBridge;
use crate::config::AccessoryConfig;
use crate::error::Error;
use crate::protocol::{InboundMessage, MqttTransport, Transport};
use crate::state::{Characteristic, StateChange};
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};
use crate::types::{CurrentState, TargetState};

/// One configured alarm accessory with a live MQTT connection.
///
/// Inbound messages are fed to the bridge by a single task, in the order
/// the broker delivered them. Device-originated changes are dispatched to
/// callbacks registered through [`Subscribable`].
///
/// # Examples
///
/// ```no_run
/// use mqtt_alarm::DeviceSession;
/// use mqtt_alarm::config::AccessoryConfig;
/// use mqtt_alarm::types::TargetState;
///
/// # async fn example() -> mqtt_alarm::Result<()> {
/// let config = AccessoryConfig::from_json_str(r#"{
///     "name": "House Alarm",
///     "url": "mqtt://192.168.1.50:1883",
///     "topics": {"statusCurrent": "alarm/status", "buttonPress": "alarm/button"}
/// }"#)?;
///
/// let session = DeviceSession::start(config).await?;
/// session.on_accessory_set(TargetState::AwayArm);
/// session.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct DeviceSession {
    bridge: SyncBridge<MqttTransport>,
    callbacks: Arc<CallbackRegistry>,
    information: AccessoryInformation,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceSession {
    /// Connects to the broker and starts bridging.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the broker cannot
    /// be reached.
    pub async fn start(config: AccessoryConfig) -> Result<Self, Error> {
        let binding = config.topic_binding()?;
        let information = config.accessory_information();

        let (transport, messages) = config.transport_builder().connect().await?;

        let callbacks = Arc::new(CallbackRegistry::new());
        let bridge = SyncBridge::with_debounce(
            binding,
            transport,
            Arc::clone(&callbacks) as Arc<dyn Accessory>,
            config.debounce(),
        );
        bridge.subscribe_all();
        tracing::info!(
            accessory = %information.name(),
            client_id = %bridge.transport().client_id(),
            current_topic = %bridge.binding().current_topic(),
            target_topic = %bridge.binding().target_topic(),
            "Session started"
        );

        let pump = tokio::spawn(pump_messages(bridge.clone(), messages));

        Ok(Self {
            bridge,
            callbacks,
            information,
            pump: Mutex::new(Some(pump)),
        })
    }

    /// Returns the bridge driving this session.
    #[must_use]
    pub fn bridge(&self) -> &SyncBridge<MqttTransport> {
        &self.bridge
    }

    /// Returns the accessory information.
    #[must_use]
    pub fn information(&self) -> &AccessoryInformation {
        &self.information
    }

    /// Returns the cached value of a characteristic.
    #[must_use]
    pub fn on_accessory_get(&self, characteristic: Characteristic) -> Option<u8> {
        self.bridge.on_accessory_get(characteristic)
    }

    /// Requests a new target state from the device.
    pub fn on_accessory_set(&self, state: TargetState) {
        self.bridge.on_accessory_set(state);
    }

    /// Stops bridging and disconnects from the broker.
    ///
    /// Pending button acknowledgements are abandoned.
    pub async fn shutdown(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.bridge.shutdown();
        self.callbacks.clear();

        if let Err(e) = self.bridge.transport().disconnect().await {
            tracing::debug!(error = %e, "Disconnect failed");
        }
        tracing::info!(accessory = %self.information.name(), "Session stopped");
    }
}

/// Feeds inbound messages to the bridge one at a time, in arrival order.
async fn pump_messages<T: Transport>(
    bridge: SyncBridge<T>,
    mut messages: mpsc::Receiver<InboundMessage>,
) {
    while let Some(message) = messages.recv().await {
        bridge.on_transport_message(&message.topic, &message.payload);
    }
    tracing::debug!("Transport message channel closed");
}

impl Subscribable for DeviceSession {
    fn on_current_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(CurrentState) + Send + Sync + 'static,
    {
        self.callbacks.on_current_state_changed(callback)
    }

    fn on_target_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(TargetState) + Send + Sync + 'static,
    {
        self.callbacks.on_target_state_changed(callback)
    }

    fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.callbacks.on_state_changed(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.unsubscribe(id)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
        self.bridge.shutdown();
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("information", &self.information)
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}
