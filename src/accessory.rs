// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory-facing capability.
//!
//! The bridge never talks to an accessory framework directly. Instead it is
//! handed an [`Accessory`] at construction time and pushes every
//! device-originated [`StateChange`] into it. Reads and writes coming from
//! the framework go the other way, through
//! [`SyncBridge::on_accessory_get`](crate::SyncBridge::on_accessory_get) and
//! [`SyncBridge::on_accessory_set`](crate::SyncBridge::on_accessory_set).

use crate::state::StateChange;

/// Receives characteristic updates from the bridge.
///
/// Implementations must not block; they are called on the message delivery
/// path. [`CallbackRegistry`](crate::subscription::CallbackRegistry) is the
/// implementation used by [`DeviceSession`](crate::DeviceSession).
pub trait Accessory: Send + Sync {
    /// Pushes a new characteristic value to the accessory side.
    fn update_characteristic(&self, change: &StateChange);
}

/// Accessory information service values.
///
/// # Examples
///
/// ```
/// use mqtt_alarm::AccessoryInformation;
///
/// let info = AccessoryInformation::new("Front Door Alarm").with_caption("Alarm");
/// assert_eq!(info.name(), "Front Door Alarm");
/// assert_eq!(info.model(), "Sonoff SV Alarm Connection");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInformation {
    name: String,
    caption: Option<String>,
    manufacturer: String,
    model: String,
    serial_number: String,
}

impl AccessoryInformation {
    /// Default manufacturer reported by the information service.
    pub const DEFAULT_MANUFACTURER: &'static str = "Danie du Plessis";
    /// Default model reported by the information service.
    pub const DEFAULT_MODEL: &'static str = "Sonoff SV Alarm Connection";
    /// Default serial number reported by the information service.
    pub const DEFAULT_SERIAL_NUMBER: &'static str = "1.0.0";

    /// Creates information for an accessory with the default
    /// manufacturer, model and serial number.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            caption: None,
            manufacturer: Self::DEFAULT_MANUFACTURER.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            serial_number: Self::DEFAULT_SERIAL_NUMBER.to_string(),
        }
    }

    /// Sets the display caption.
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Sets the manufacturer.
    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the serial number.
    #[must_use]
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = serial_number.into();
        self
    }

    /// Returns the accessory display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the display caption, if configured.
    #[must_use]
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// Returns the manufacturer.
    #[must_use]
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Returns the model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the serial number.
    #[must_use]
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }
}
