// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cached alarm state.

use std::fmt;

use crate::types::{CurrentState, TargetState};

/// One of the two accessory characteristics backed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// The device-reported state. Read-only on the accessory side.
    CurrentState,
    /// The requested state. Readable and writable on the accessory side.
    TargetState,
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentState => write!(f, "SecuritySystemCurrentState"),
            Self::TargetState => write!(f, "SecuritySystemTargetState"),
        }
    }
}

/// In-memory cache of the last known current and target state.
///
/// Both values start out unset (`None`) and only ever hold a valid member of
/// their domain afterwards. Setters return the previous value so callers can
/// detect whether anything changed.
///
/// # Examples
///
/// ```
/// use mqtt_alarm::state::StateStore;
/// use mqtt_alarm::types::TargetState;
///
/// let mut store = StateStore::new();
/// assert_eq!(store.target(), None);
///
/// let previous = store.set_target(TargetState::Disarm);
/// assert_eq!(previous, None);
/// assert_eq!(store.target(), Some(TargetState::Disarm));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateStore {
    current: Option<CurrentState>,
    target: Option<TargetState>,
}

impl StateStore {
    /// Creates an empty store with both values unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached current state.
    #[must_use]
    pub fn current(&self) -> Option<CurrentState> {
        self.current
    }

    /// Returns the cached target state.
    #[must_use]
    pub fn target(&self) -> Option<TargetState> {
        self.target
    }

    /// Overwrites the current state, returning the previous value.
    pub fn set_current(&mut self, state: CurrentState) -> Option<CurrentState> {
        self.current.replace(state)
    }

    /// Overwrites the target state, returning the previous value.
    pub fn set_target(&mut self, state: TargetState) -> Option<TargetState> {
        self.target.replace(state)
    }

    /// Returns the numeric value cached for a characteristic.
    #[must_use]
    pub fn get(&self, characteristic: Characteristic) -> Option<u8> {
        match characteristic {
            Characteristic::CurrentState => self.current.map(|s| s.as_num()),
            Characteristic::TargetState => self.target.map(|s| s.as_num()),
        }
    }
}
