// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription system for alarm state changes.
//!
//! - [`SubscriptionId`] - identifies a subscription, used to unsubscribe
//! - [`CallbackRegistry`] - stores callbacks and implements
//!   [`Accessory`](crate::Accessory), so it can be handed straight to a
//!   [`SyncBridge`](crate::SyncBridge)
//! - [`Subscribable`] - trait for types that expose subscriptions

mod callback;
mod subscribable;

pub use callback::{CallbackRegistry, SubscriptionId};
pub use subscribable::Subscribable;
