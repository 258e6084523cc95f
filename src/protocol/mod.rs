// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Publish/subscribe transport used by the bridge.
//!
//! The bridge only needs two outbound operations, [`Transport::subscribe`]
//! and [`Transport::publish`], plus a stream of [`InboundMessage`]s. Both
//! outbound operations only queue the request, so they can be called from
//! synchronous handlers and timer tasks alike.
//!
//! - [`MqttTransport`]: `rumqttc` implementation with automatic reconnection

#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::{LastWill, MqttTransport, MqttTransportBuilder};

use crate::error::ProtocolError;

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// The topic the message was published on.
    pub topic: String,
    /// The raw message body.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Creates a new inbound message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Outbound side of a publish/subscribe channel.
///
/// Implementations queue requests without waiting for the network.
/// Connection loss and reconnection are the implementation's concern; the
/// bridge only logs the errors returned here.
///
/// The bridge calls [`publish`](Transport::publish) while holding its state
/// lock, so an implementation must not block or call back into the bridge.
pub trait Transport: Send + Sync + 'static {
    /// Subscribes to a topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request cannot be queued.
    fn subscribe(&self, topic: &str) -> Result<(), ProtocolError>;

    /// Publishes a payload on a topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request cannot be queued.
    fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError>;
}
