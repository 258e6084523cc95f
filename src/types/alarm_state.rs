// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Security system state values.
//!
//! The current and target states share their first four numeric values, but
//! only the current state can report a triggered alarm. On the wire both are
//! published as the decimal form of their number.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// The observed state of the alarm, as reported by the device.
///
/// # Examples
///
/// ```
/// use mqtt_alarm::types::CurrentState;
///
/// let state: CurrentState = "4".parse().unwrap();
/// assert_eq!(state, CurrentState::AlarmTriggered);
/// assert_eq!(state.payload(), "4");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrentState {
    /// Armed while occupants are home.
    StayArm,
    /// Armed while the premises are empty.
    AwayArm,
    /// Armed for the night.
    NightArm,
    /// Not armed.
    Disarmed,
    /// The alarm is going off.
    AlarmTriggered,
}

impl CurrentState {
    /// All current states in numeric order.
    pub const ALL: [Self; 5] = [
        Self::StayArm,
        Self::AwayArm,
        Self::NightArm,
        Self::Disarmed,
        Self::AlarmTriggered,
    ];

    /// Returns the numeric value of the state.
    #[must_use]
    pub const fn as_num(&self) -> u8 {
        match self {
            Self::StayArm => 0,
            Self::AwayArm => 1,
            Self::NightArm => 2,
            Self::Disarmed => 3,
            Self::AlarmTriggered => 4,
        }
    }

    /// Returns the symbolic name of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StayArm => "STAY_ARM",
            Self::AwayArm => "AWAY_ARM",
            Self::NightArm => "NIGHT_ARM",
            Self::Disarmed => "DISARMED",
            Self::AlarmTriggered => "ALARM_TRIGGERED",
        }
    }

    /// Returns the MQTT payload for this state.
    #[must_use]
    pub fn payload(&self) -> String {
        self.as_num().to_string()
    }
}

impl TryFrom<i64> for CurrentState {
    type Error = ValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::StayArm),
            1 => Ok(Self::AwayArm),
            2 => Ok(Self::NightArm),
            3 => Ok(Self::Disarmed),
            4 => Ok(Self::AlarmTriggered),
            _ => Err(ValueError::InvalidCurrentState(value)),
        }
    }
}

impl FromStr for CurrentState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(parse_integer(s)?)
    }
}

impl From<TargetState> for CurrentState {
    fn from(target: TargetState) -> Self {
        match target {
            TargetState::StayArm => Self::StayArm,
            TargetState::AwayArm => Self::AwayArm,
            TargetState::NightArm => Self::NightArm,
            TargetState::Disarm => Self::Disarmed,
        }
    }
}

impl fmt::Display for CurrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state the user wants the alarm to be in.
///
/// # Examples
///
/// ```
/// use mqtt_alarm::types::TargetState;
///
/// assert_eq!(TargetState::try_from(3).unwrap(), TargetState::Disarm);
/// assert!(TargetState::try_from(4).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Arm while occupants are home.
    StayArm,
    /// Arm while the premises are empty.
    AwayArm,
    /// Arm for the night.
    NightArm,
    /// Disarm.
    Disarm,
}

impl TargetState {
    /// All target states in numeric order.
    pub const ALL: [Self; 4] = [Self::StayArm, Self::AwayArm, Self::NightArm, Self::Disarm];

    /// Returns the numeric value of the state.
    #[must_use]
    pub const fn as_num(&self) -> u8 {
        match self {
            Self::StayArm => 0,
            Self::AwayArm => 1,
            Self::NightArm => 2,
            Self::Disarm => 3,
        }
    }

    /// Returns the symbolic name of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StayArm => "STAY_ARM",
            Self::AwayArm => "AWAY_ARM",
            Self::NightArm => "NIGHT_ARM",
            Self::Disarm => "DISARM",
        }
    }

    /// Returns the MQTT payload for this state.
    #[must_use]
    pub fn payload(&self) -> String {
        self.as_num().to_string()
    }
}

impl TryFrom<i64> for TargetState {
    type Error = ValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::StayArm),
            1 => Ok(Self::AwayArm),
            2 => Ok(Self::NightArm),
            3 => Ok(Self::Disarm),
            _ => Err(ValueError::InvalidTargetState(value)),
        }
    }
}

impl FromStr for TargetState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(parse_integer(s)?)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses a raw MQTT payload as a decimal integer.
///
/// Surrounding whitespace is ignored. Payloads that are not UTF-8 or not an
/// integer are rejected.
///
/// # Errors
///
/// Returns `ValueError::NotAnInteger` if the payload cannot be parsed.
pub fn parse_payload(raw: &[u8]) -> Result<i64, ValueError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| ValueError::NotAnInteger(String::from_utf8_lossy(raw).into_owned()))?;
    parse_integer(text)
}

fn parse_integer(s: &str) -> Result<i64, ValueError> {
    s.trim()
        .parse()
        .map_err(|_| ValueError::NotAnInteger(s.to_string()))
}
