// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for security system state.
//!
//! - [`CurrentState`]: the state the device reports (0-4)
//! - [`TargetState`]: the state the user asked for (0-3)

mod alarm_state;

pub use alarm_state::{CurrentState, TargetState, parse_payload};
