// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cached device state and topic routing.
//!
//! [`StateStore`] holds the last known current and target state,
//! [`TopicBinding`] maps MQTT topics onto them, and [`StateChange`] is the
//! notification pushed to the accessory side when a value changes.
//!
//! # Examples
//!
//! ```
//! use mqtt_alarm::state::{StateStore, TopicBinding, Characteristic};
//! use mqtt_alarm::types::CurrentState;
//!
//! let binding = TopicBinding::button_press("alarm/status", "alarm/button");
//! let mut store = StateStore::new();
//!
//! if binding.field_for("alarm/status") == Some(Characteristic::CurrentState) {
//!     store.set_current(CurrentState::AwayArm);
//! }
//! assert_eq!(store.get(Characteristic::CurrentState), Some(1));
//! ```

mod state_change;
mod state_store;
mod topic_binding;

pub use state_change::StateChange;
pub use state_store::{Characteristic, StateStore};
pub use topic_binding::{BindingMode, TopicBinding};
