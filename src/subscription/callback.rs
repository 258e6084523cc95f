// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for alarm state subscriptions.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry that stores callbacks and dispatches
//!   state changes to them

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::accessory::Accessory;
use crate::state::StateChange;
use crate::types::{CurrentState, TargetState};

/// Unique identifier for a subscription.
///
/// Returned when registering a callback and used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type CurrentStateCallback = Arc<dyn Fn(CurrentState) + Send + Sync>;

type TargetStateCallback = Arc<dyn Fn(TargetState) + Send + Sync>;

type StateChangedCallback = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Registry for alarm state callbacks.
///
/// Uses `parking_lot::RwLock` for interior mutability so callbacks can be
/// registered from any task while the bridge is dispatching.
///
/// Callbacks are cloned out of the registry before they are invoked, so a
/// callback may register or unsubscribe other callbacks without deadlocking.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    current_callbacks: RwLock<HashMap<SubscriptionId, CurrentStateCallback>>,
    target_callbacks: RwLock<HashMap<SubscriptionId, TargetStateCallback>>,
    state_changed_callbacks: RwLock<HashMap<SubscriptionId, StateChangedCallback>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            current_callbacks: RwLock::new(HashMap::new()),
            target_callbacks: RwLock::new(HashMap::new()),
            state_changed_callbacks: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for current state changes.
    pub fn on_current_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(CurrentState) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.current_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for target state changes.
    pub fn on_target_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(TargetState) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.target_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for every state change.
    pub fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.state_changed_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.current_callbacks.write().remove(&id).is_some()
            || self.target_callbacks.write().remove(&id).is_some()
            || self.state_changed_callbacks.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.current_callbacks.write().clear();
        self.target_callbacks.write().clear();
        self.state_changed_callbacks.write().clear();
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches a state change to the matching callbacks.
    ///
    /// Generic `on_state_changed` callbacks run first, then the callbacks
    /// registered for the specific characteristic.
    pub fn dispatch(&self, change: &StateChange) {
        let generic: Vec<_> = self.state_changed_callbacks.read().values().cloned().collect();
        for callback in generic {
            callback(change);
        }

        match *change {
            StateChange::Current(state) => {
                let callbacks: Vec<_> = self.current_callbacks.read().values().cloned().collect();
                for callback in callbacks {
                    callback(state);
                }
            }
            StateChange::Target(state) => {
                let callbacks: Vec<_> = self.target_callbacks.read().values().cloned().collect();
                for callback in callbacks {
                    callback(state);
                }
            }
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.current_callbacks.read().len()
            + self.target_callbacks.read().len()
            + self.state_changed_callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Accessory for CallbackRegistry {
    fn update_characteristic(&self, change: &StateChange) {
        tracing::trace!(%change, "Dispatching characteristic update");
        self.dispatch(change);
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn subscription_id_display() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.to_string(), "Sub(42)");
        assert_eq!(id.value(), 42);
    }

    #[test]
    fn registry_new_is_empty() {
        let registry = CallbackRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.callback_count(), 0);
    }

    #[test]
    fn registry_current_callback() {
        let registry = CallbackRegistry::new();
        let received = Arc::new(RwLock::new(None::<CurrentState>));
        let received_clone = received.clone();

        let id = registry.on_current_state_changed(move |state| {
            *received_clone.write() = Some(state);
        });

        registry.dispatch(&StateChange::Current(CurrentState::AlarmTriggered));
        assert_eq!(*received.read(), Some(CurrentState::AlarmTriggered));

        assert!(registry.unsubscribe(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_routes_by_characteristic() {
        let registry = CallbackRegistry::new();
        let current = Arc::new(AtomicU32::new(0));
        let target = Arc::new(AtomicU32::new(0));
        let c = current.clone();
        let t = target.clone();

        registry.on_current_state_changed(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        registry.on_target_state_changed(move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&StateChange::Target(TargetState::Disarm));
        registry.dispatch(&StateChange::Target(TargetState::AwayArm));

        assert_eq!(current.load(Ordering::SeqCst), 0);
        assert_eq!(target.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn registry_state_changed_receives_everything() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        registry.on_state_changed(move |_change| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&StateChange::Current(CurrentState::Disarmed));
        registry.dispatch(&StateChange::Target(TargetState::Disarm));

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn accessory_impl_dispatches() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        registry.on_state_changed(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let accessory: &dyn Accessory = &registry;
        accessory.update_characteristic(&StateChange::Current(CurrentState::StayArm));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_unsubscribe_during_dispatch() {
        let registry = Arc::new(CallbackRegistry::new());
        let slot = Arc::new(RwLock::new(None::<SubscriptionId>));

        let registry_clone = Arc::clone(&registry);
        let slot_clone = Arc::clone(&slot);
        let id = registry.on_state_changed(move |_| {
            if let Some(id) = *slot_clone.read() {
                registry_clone.unsubscribe(id);
            }
        });
        *slot.write() = Some(id);

        registry.dispatch(&StateChange::Current(CurrentState::AwayArm));
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_unsubscribe_nonexistent() {
        let registry = CallbackRegistry::new();
        assert!(!registry.unsubscribe(SubscriptionId::new(999)));
    }

    #[test]
    fn registry_clear() {
        let registry = CallbackRegistry::new();
        registry.on_current_state_changed(|_| {});
        registry.on_target_state_changed(|_| {});
        registry.on_state_changed(|_| {});
        assert_eq!(registry.callback_count(), 3);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_unique_ids() {
        let registry = CallbackRegistry::new();
        let id1 = registry.on_current_state_changed(|_| {});
        let id2 = registry.on_target_state_changed(|_| {});
        let id3 = registry.on_state_changed(|_| {});

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn registry_debug() {
        let registry = CallbackRegistry::new();
        registry.on_current_state_changed(|_| {});

        let debug = format!("{registry:?}");
        assert!(debug.contains("CallbackRegistry"));
        assert!(debug.contains("callback_count"));
    }
}
