// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routing of MQTT topics to cached characteristics.

use super::Characteristic;

/// How the target topic behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingMode {
    /// The target topic carries arm/disarm button presses from the device.
    ///
    /// A new value is treated as an external request: both cached states
    /// follow it and the value is acknowledged back on the same topic after
    /// a debounce delay.
    ButtonPress,
    /// The target topic mirrors the device's own target state.
    ///
    /// A new value only updates the cached target state and is never
    /// republished.
    StatusTarget,
}

/// Binds one MQTT topic to each characteristic.
///
/// # Examples
///
/// ```
/// use mqtt_alarm::state::{Characteristic, TopicBinding};
///
/// let binding = TopicBinding::button_press("alarm/status", "alarm/button");
/// assert_eq!(binding.field_for("alarm/status"), Some(Characteristic::CurrentState));
/// assert_eq!(binding.field_for("alarm/button"), Some(Characteristic::TargetState));
/// assert_eq!(binding.field_for("alarm/other"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBinding {
    current_topic: String,
    target_topic: String,
    mode: BindingMode,
}

impl TopicBinding {
    /// Creates a binding for a device with a button-press topic.
    #[must_use]
    pub fn button_press(current_topic: impl Into<String>, button_topic: impl Into<String>) -> Self {
        Self::new(current_topic, button_topic, BindingMode::ButtonPress)
    }

    /// Creates a binding for a device that reports its target state.
    #[must_use]
    pub fn status_target(current_topic: impl Into<String>, target_topic: impl Into<String>) -> Self {
        Self::new(current_topic, target_topic, BindingMode::StatusTarget)
    }

    /// Creates a binding with an explicit mode.
    #[must_use]
    pub fn new(
        current_topic: impl Into<String>,
        target_topic: impl Into<String>,
        mode: BindingMode,
    ) -> Self {
        Self {
            current_topic: current_topic.into(),
            target_topic: target_topic.into(),
            mode,
        }
    }

    /// Returns the topic carrying the current state.
    #[must_use]
    pub fn current_topic(&self) -> &str {
        &self.current_topic
    }

    /// Returns the topic carrying the target state or button presses.
    #[must_use]
    pub fn target_topic(&self) -> &str {
        &self.target_topic
    }

    /// Returns how the target topic behaves.
    #[must_use]
    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    /// Returns the characteristic bound to `topic`, if any.
    ///
    /// The current-state binding wins if both topics are the same string.
    #[must_use]
    pub fn field_for(&self, topic: &str) -> Option<Characteristic> {
        if topic == self.current_topic {
            Some(Characteristic::CurrentState)
        } else if topic == self.target_topic {
            Some(Characteristic::TargetState)
        } else {
            None
        }
    }

    /// Returns both bound topics, current first.
    #[must_use]
    pub fn topics(&self) -> [&str; 2] {
        [self.current_topic.as_str(), self.target_topic.as_str()]
    }
}
