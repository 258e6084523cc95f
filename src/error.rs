// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the alarm bridge.
//!
//! Only the fallible edges of the crate return these errors: value
//! validation, transport setup and configuration loading. The bridge
//! handlers themselves never surface an error to the accessory side.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during transport communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to alarm state values and payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The number is not a valid current state (0-4).
    #[error("invalid current state: {0}")]
    InvalidCurrentState(i64),

    /// The number is not a valid target state (0-3).
    #[error("invalid target state: {0}")]
    InvalidTargetState(i64),

    /// The payload is not a decimal integer.
    #[error("payload is not an integer: {0:?}")]
    NotAnInteger(String),
}

/// Errors related to the MQTT transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request could not be queued.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker did not acknowledge the connection in time.
    #[error("connection timed out after {0} ms")]
    Timeout(u64),

    /// Invalid broker URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors related to loading and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON for the expected shape.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is missing or empty.
    #[error("accessory {accessory:?}: missing required field `{field}`")]
    MissingField {
        /// Name of the accessory being validated.
        accessory: String,
        /// The missing field.
        field: &'static str,
    },

    /// A field has a value outside its allowed range.
    #[error("accessory {accessory:?}: invalid `{field}`: {message}")]
    InvalidValue {
        /// Name of the accessory being validated.
        accessory: String,
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// Both `buttonPress` and `statusTarget` were configured.
    #[error("accessory {0:?}: `topics.buttonPress` and `topics.statusTarget` are mutually exclusive")]
    ConflictingTargetTopics(String),

    /// The current and target topics are the same string.
    #[error("accessory {accessory:?}: topic {topic:?} is bound to both current and target state")]
    DuplicateTopic {
        /// Name of the accessory being validated.
        accessory: String,
        /// The topic bound twice.
        topic: String,
    },

    /// The configuration file declares no accessories.
    #[error("no accessories configured")]
    NoAccessories,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
