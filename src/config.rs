// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory configuration.
//!
//! Configuration is read from JSON in the Homebridge layout, either a whole
//! file with an `accessories` array or a single accessory object. Entries
//! whose `accessory` type names a different plugin are skipped. Every
//! accepted entry is validated when it is loaded, so a missing or
//! conflicting topic fails before any connection is made.
//!
//! ```json
//! {
//!   "accessories": [
//!     {
//!       "accessory": "Mqttalarm",
//!       "name": "House Alarm",
//!       "url": "mqtt://192.168.1.50:1883",
//!       "username": "user",
//!       "password": "secret",
//!       "caption": "Alarm",
//!       "topics": {
//!         "statusCurrent": "alarm/status",
//!         "buttonPress": "alarm/button"
//!       }
//!     }
//!   ]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::accessory::AccessoryInformation;
use crate::error::ConfigError;
use crate::state::{BindingMode, TopicBinding};

/// Accessory type handled by this crate.
pub const ACCESSORY_TYPE: &str = "Mqttalarm";

fn default_debounce_ms() -> u64 {
    500
}

/// Configuration for one alarm accessory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryConfig {
    /// Accessory type; entries naming another type are skipped.
    #[serde(default)]
    pub accessory: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Broker URL.
    #[serde(default)]
    pub url: String,
    /// Broker username.
    #[serde(default)]
    pub username: Option<String>,
    /// Broker password.
    #[serde(default)]
    pub password: Option<String>,
    /// Display caption.
    #[serde(default)]
    pub caption: Option<String>,
    /// Topic bindings.
    #[serde(default)]
    pub topics: TopicsConfig,
    /// MQTT connection options.
    #[serde(default)]
    pub mqtt: MqttOptionsConfig,
    /// Delay in milliseconds before a button press is acknowledged.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Manufacturer reported by the information service.
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// Model reported by the information service.
    #[serde(default)]
    pub model: Option<String>,
    /// Serial number reported by the information service.
    #[serde(default)]
    pub serial_number: Option<String>,
}

/// Topic names for one accessory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicsConfig {
    /// Topic carrying the device's current state.
    pub status_current: Option<String>,
    /// Topic carrying arm/disarm button presses.
    pub button_press: Option<String>,
    /// Topic carrying the device's target state.
    pub status_target: Option<String>,
}

/// MQTT connection options, using the units of the Node.js MQTT client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MqttOptionsConfig {
    /// Keep-alive interval in seconds.
    pub keepalive: u64,
    /// Client identifier; generated when absent.
    pub client_id: Option<String>,
    /// Clean-session flag.
    pub clean: bool,
    /// Delay between reconnection attempts in milliseconds.
    pub reconnect_period: u64,
    /// Initial connection timeout in milliseconds.
    pub connect_timeout: u64,
    /// Whether TLS certificates must be valid.
    pub reject_unauthorized: bool,
    /// Last will message; `null` disables it.
    pub will: Option<WillConfig>,
}

impl Default for MqttOptionsConfig {
    fn default() -> Self {
        Self {
            keepalive: 10,
            client_id: None,
            clean: true,
            reconnect_period: 1000,
            connect_timeout: 30 * 1000,
            reject_unauthorized: true,
            will: Some(WillConfig::default()),
        }
    }
}

/// Last will message options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WillConfig {
    /// Will topic.
    pub topic: String,
    /// Will payload.
    pub payload: String,
    /// Quality of service (0-2).
    pub qos: u8,
    /// Retain flag.
    pub retain: bool,
}

impl Default for WillConfig {
    fn default() -> Self {
        Self {
            topic: "WillMsg".to_string(),
            payload: "Connection Closed abnormally..!".to_string(),
            qos: 0,
            retain: false,
        }
    }
}

impl AccessoryConfig {
    /// Parses and validates a single accessory from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the JSON is malformed or validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks required fields and topic consistency.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(self.missing("name"));
        }
        if self.url.trim().is_empty() {
            return Err(self.missing("url"));
        }
        if let Some(ref will) = self.mqtt.will
            && will.qos > 2
        {
            return Err(ConfigError::InvalidValue {
                accessory: self.name.clone(),
                field: "mqtt.will.qos",
                message: format!("{} is not 0, 1 or 2", will.qos),
            });
        }
        if self.mqtt.keepalive == 0 {
            return Err(ConfigError::InvalidValue {
                accessory: self.name.clone(),
                field: "mqtt.keepalive",
                message: "must be at least 1 second".to_string(),
            });
        }
        self.topic_binding().map(|_| ())
    }

    /// Builds the topic binding from the configured topics.
    ///
    /// The binding mode follows whichever target topic is present.
    ///
    /// # Errors
    ///
    /// Returns error if the current topic is missing, if neither or both
    /// target topics are set, or if current and target share a topic.
    pub fn topic_binding(&self) -> Result<TopicBinding, ConfigError> {
        let current = non_empty(self.topics.status_current.as_deref())
            .ok_or_else(|| self.missing("topics.statusCurrent"))?;

        let button = non_empty(self.topics.button_press.as_deref());
        let target = non_empty(self.topics.status_target.as_deref());

        let (target_topic, mode) = match (button, target) {
            (Some(topic), None) => (topic, BindingMode::ButtonPress),
            (None, Some(topic)) => (topic, BindingMode::StatusTarget),
            (Some(_), Some(_)) => {
                return Err(ConfigError::ConflictingTargetTopics(self.name.clone()));
            }
            (None, None) => return Err(self.missing("topics.buttonPress")),
        };

        if current == target_topic {
            return Err(ConfigError::DuplicateTopic {
                accessory: self.name.clone(),
                topic: current.to_string(),
            });
        }

        Ok(TopicBinding::new(current, target_topic, mode))
    }

    /// Returns the values for the accessory information service.
    #[must_use]
    pub fn accessory_information(&self) -> AccessoryInformation {
        let mut info = AccessoryInformation::new(self.name.clone());
        if let Some(ref caption) = self.caption {
            info = info.with_caption(caption.clone());
        }
        if let Some(ref manufacturer) = self.manufacturer {
            info = info.with_manufacturer(manufacturer.clone());
        }
        if let Some(ref model) = self.model {
            info = info.with_model(model.clone());
        }
        if let Some(ref serial_number) = self.serial_number {
            info = info.with_serial_number(serial_number.clone());
        }
        info
    }

    /// Returns the button acknowledgement delay.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Creates a transport builder from the connection settings.
    #[cfg(feature = "mqtt")]
    #[must_use]
    pub fn transport_builder(&self) -> crate::protocol::MqttTransportBuilder {
        let options = &self.mqtt;
        let mut builder = crate::protocol::MqttTransport::builder(self.url.clone())
            .keep_alive(Duration::from_secs(options.keepalive))
            .clean_session(options.clean)
            .reconnect_period(Duration::from_millis(options.reconnect_period))
            .connection_timeout(Duration::from_millis(options.connect_timeout))
            .verify_tls(options.reject_unauthorized)
            .last_will(options.will.as_ref().map(|will| crate::protocol::LastWill {
                topic: will.topic.clone(),
                payload: will.payload.clone(),
                qos: will.qos,
                retain: will.retain,
            }));

        if let Some(ref client_id) = options.client_id {
            builder = builder.client_id(client_id.clone());
        }
        if let Some(ref username) = self.username {
            builder = builder.credentials(
                username.clone(),
                self.password.clone().unwrap_or_default(),
            );
        }
        builder
    }

    fn missing(&self, field: &'static str) -> ConfigError {
        ConfigError::MissingField {
            accessory: self.name.clone(),
            field,
        }
    }

    fn is_handled_type(accessory: Option<&str>) -> bool {
        accessory.is_none_or(|kind| kind.eq_ignore_ascii_case(ACCESSORY_TYPE))
    }
}

/// Returns the value unchanged unless it is absent or blank.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A whole configuration file.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Validated alarm accessories.
    pub accessories: Vec<AccessoryConfig>,
}

impl BridgeConfig {
    /// Parses and validates a configuration document.
    ///
    /// Accepts `{"accessories": [...]}` or a single accessory object.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the JSON is malformed, an alarm entry is
    /// invalid, or no alarm accessory is configured.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let document: serde_json::Value = serde_json::from_str(json)?;

        let entries = match document {
            serde_json::Value::Object(mut map) if map.contains_key("accessories") => {
                match map.remove("accessories") {
                    Some(serde_json::Value::Array(entries)) => entries,
                    _ => Vec::new(),
                }
            }
            other => vec![other],
        };

        let mut accessories = Vec::new();
        for entry in entries {
            let kind = entry.get("accessory").and_then(serde_json::Value::as_str);
            if !AccessoryConfig::is_handled_type(kind) {
                tracing::debug!(accessory = ?kind, "Skipping accessory of another type");
                continue;
            }

            let config: AccessoryConfig = serde_json::from_value(entry)?;
            config.validate()?;
            accessories.push(config);
        }

        if accessories.is_empty() {
            return Err(ConfigError::NoAccessories);
        }

        Ok(Self { accessories })
    }

    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading configuration");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
