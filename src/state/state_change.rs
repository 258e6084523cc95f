// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! A [`StateChange`] is what the bridge pushes to the accessory side whenever
//! a cached value is updated by the device.

use crate::types::{CurrentState, TargetState};

use super::Characteristic;

/// A new value for one of the accessory characteristics.
///
/// # Examples
///
/// ```
/// use mqtt_alarm::state::{Characteristic, StateChange};
/// use mqtt_alarm::types::CurrentState;
///
/// let change = StateChange::Current(CurrentState::AlarmTriggered);
/// assert_eq!(change.characteristic(), Characteristic::CurrentState);
/// assert_eq!(change.value(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// The current state changed.
    Current(CurrentState),
    /// The target state changed.
    Target(TargetState),
}

impl StateChange {
    /// Returns which characteristic this change applies to.
    #[must_use]
    pub fn characteristic(&self) -> Characteristic {
        match self {
            Self::Current(_) => Characteristic::CurrentState,
            Self::Target(_) => Characteristic::TargetState,
        }
    }

    /// Returns the numeric value carried by the change.
    #[must_use]
    pub fn value(&self) -> u8 {
        match self {
            Self::Current(state) => state.as_num(),
            Self::Target(state) => state.as_num(),
        }
    }
}

impl std::fmt::Display for StateChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current(state) => write!(f, "{} = {state}", self.characteristic()),
            Self::Target(state) => write!(f, "{} = {state}", self.characteristic()),
        }
    }
}
