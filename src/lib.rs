// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mqtt_alarm` - bridges an MQTT security alarm to a smart-home accessory.
//!
//! The alarm panel publishes its state as small integers on MQTT topics.
//! This library keeps a cached copy of the current and target state,
//! pushes device changes to the accessory, and publishes accessory
//! requests back to the device without looping on its own echoes.
//!
//! # State values
//!
//! | Value | Current state     | Target state |
//! |-------|-------------------|--------------|
//! | 0     | `STAY_ARM`        | `STAY_ARM`   |
//! | 1     | `AWAY_ARM`        | `AWAY_ARM`   |
//! | 2     | `NIGHT_ARM`       | `NIGHT_ARM`  |
//! | 3     | `DISARMED`        | `DISARM`     |
//! | 4     | `ALARM_TRIGGERED` | -            |
//!
//! # Topic bindings
//!
//! Every accessory binds a current-state topic and one target topic:
//!
//! - **Button press** (`topics.buttonPress`): the device reports the armed
//!   mode chosen on its keypad. The value becomes both target and current
//!   state and is acknowledged on the same topic after a short delay.
//! - **Status target** (`topics.statusTarget`): the device reports its
//!   target state separately from its current state.
//!
//! # Quick Start
//!
//! ```no_run
//! use mqtt_alarm::DeviceSession;
//! use mqtt_alarm::config::BridgeConfig;
//! use mqtt_alarm::subscription::Subscribable;
//!
//! #[tokio::main]
//! async fn main() -> mqtt_alarm::Result<()> {
//!     let config = BridgeConfig::from_file("config.json")?;
//!
//!     for accessory in config.accessories {
//!         let session = DeviceSession::start(accessory).await?;
//!         session.on_state_changed(|change| println!("{change}"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Custom transports
//!
//! [`SyncBridge`] is generic over [`protocol::Transport`], so it can run on
//! any publish/subscribe client. Build without the default features to drop
//! the MQTT client entirely.

pub mod accessory;
pub mod bridge;
pub mod config;
pub mod error;
pub mod protocol;
#[cfg(feature = "mqtt")]
mod session;
pub mod state;
pub mod subscription;
pub mod types;

pub use accessory::{Accessory, AccessoryInformation};
pub use bridge::{DEFAULT_DEBOUNCE_DELAY, SyncBridge};
pub use error::{ConfigError, Error, ProtocolError, Result, ValueError};
#[cfg(feature = "mqtt")]
pub use protocol::{MqttTransport, MqttTransportBuilder};
#[cfg(feature = "mqtt")]
pub use session::DeviceSession;
pub use state::{BindingMode, Characteristic, StateChange, StateStore, TopicBinding};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use types::{CurrentState, TargetState};
