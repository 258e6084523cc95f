// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that emit alarm state changes.

use crate::state::StateChange;
use crate::subscription::SubscriptionId;
use crate::types::{CurrentState, TargetState};

/// Trait for types that support state change subscriptions.
///
/// Only device-originated changes are emitted. A target state set through
/// [`SyncBridge::on_accessory_set`](crate::SyncBridge::on_accessory_set) is
/// already known to the caller and is not echoed back.
///
/// # Examples
///
/// ```no_run
/// use mqtt_alarm::DeviceSession;
/// use mqtt_alarm::config::AccessoryConfig;
/// use mqtt_alarm::subscription::Subscribable;
///
/// # async fn example(config: AccessoryConfig) -> mqtt_alarm::Result<()> {
/// let session = DeviceSession::start(config).await?;
///
/// let sub_id = session.on_current_state_changed(|state| {
///     println!("Alarm is now {state}");
/// });
///
/// session.unsubscribe(sub_id);
/// # Ok(())
/// # }
/// ```
pub trait Subscribable {
    /// Subscribes to current state changes reported by the device.
    fn on_current_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(CurrentState) + Send + Sync + 'static;

    /// Subscribes to target state changes reported by the device.
    fn on_target_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(TargetState) + Send + Sync + 'static;

    /// Subscribes to all state changes.
    fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static;

    /// Unsubscribes a callback by its subscription ID.
    ///
    /// Returns `true` if the subscription was found and removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
