//! Matter cluster states and handlers for the bridged devices.
//!
//! Every functional cluster comes in two halves:
//! - a thread-safe *state* shared with the device that owns the endpoint, and
//! - a handler that serves the state through rs-matter's data model.
//!
//! OnOff is served by rs-matter's own handler with the state as its hooks.
//! The other handlers are implemented manually (attribute/command enums plus
//! a `Cluster` definition) so that one dispatcher can route any endpoint to
//! them at runtime.

use super::notifier::ClusterNotifier;
use crate::callback::{Callback, CallbackSlot};
use parking_lot::RwLock;
use rs_matter::dm::Dataver;
use std::sync::atomic::{AtomicU32, Ordering};

pub mod bridged_device_basic_info;
pub mod fan_control;
pub mod generic_switch;
pub mod identify;
pub mod on_off;
pub mod window_covering;

pub use bridged_device_basic_info::{BridgedClusterHandler, BridgedHandler, BridgedInfo};
pub use fan_control::{FanControlHandler, FanControlState, FanMode};
pub use generic_switch::{GenericSwitchHandler, GenericSwitchState, SwitchEvent};
pub use identify::IdentifyHandler;
pub use on_off::{OnOffHandler, OnOffState};
pub use window_covering::{WindowCoveringHandler, WindowCoveringState};

/// Common surface of all cluster states.
///
/// The version increments on every value change; handlers compare it with
/// the last version they served and bump their `Dataver` on a mismatch.
pub trait ClusterState: Send + Sync {
    fn version(&self) -> u32;

    /// Wire the state to the subscription system.
    fn set_notifier(&self, notifier: ClusterNotifier);

    /// Register the hook run after a controller changed the state.
    fn set_controller_hook(&self, hook: Callback);
}

/// Bookkeeping shared by every cluster state.
#[derive(Default)]
pub struct StateCore {
    version: AtomicU32,
    notifier: RwLock<Option<ClusterNotifier>>,
    controller_hook: CallbackSlot,
}

impl StateCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn set_notifier(&self, notifier: ClusterNotifier) {
        *self.notifier.write() = Some(notifier);
    }

    pub fn set_controller_hook(&self, hook: Callback) {
        self.controller_hook.set(hook);
    }

    /// Record that `attr_id` changed: bump the version and push to subscribers.
    pub fn changed(&self, attr_id: u32) {
        self.version.fetch_add(1, Ordering::SeqCst);
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify(attr_id);
        }
    }

    /// Push to subscribers without a value change (new events).
    pub fn wake(&self, attr_id: u32) {
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify(attr_id);
        }
    }

    /// Hand a controller-originated change to the owning device.
    pub fn controller_changed(&self) {
        self.controller_hook.fire();
    }
}

/// Sync dataver with state version changes.
///
/// Called at the start of every read so that subscribers see changes made
/// from the accessory side.
pub fn sync_dataver_with_state<S: ClusterState + ?Sized>(
    state: &S,
    last_version: &AtomicU32,
    dataver: &Dataver,
) {
    let current = state.version();
    let last = last_version.swap(current, Ordering::SeqCst);
    if current != last {
        dataver.changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_changed_bumps_version() {
        let core = StateCore::new();
        assert_eq!(core.version(), 0);
        core.changed(0);
        core.changed(1);
        assert_eq!(core.version(), 2);
    }

    #[test]
    fn test_controller_changed_fires_hook_only() {
        let core = StateCore::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        core.set_controller_hook(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        core.controller_changed();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(core.version(), 0);
    }

    #[test]
    fn test_dataver_follows_accessory_reports() {
        let state = OnOffState::new(false);
        let last_version = AtomicU32::new(0);
        let dataver = Dataver::new(0);

        sync_dataver_with_state(&state, &last_version, &dataver);
        assert_eq!(dataver.get(), 0);

        state.report(true);
        sync_dataver_with_state(&state, &last_version, &dataver);
        assert_eq!(dataver.get(), 1);

        // Only once per version
        sync_dataver_with_state(&state, &last_version, &dataver);
        assert_eq!(dataver.get(), 1);
    }

    #[test]
    fn test_dataver_follows_handler_state() {
        let state = Arc::new(WindowCoveringState::new());
        let last_version = AtomicU32::new(0);
        let dataver = Dataver::new(0);

        state.report_current(2500);
        sync_dataver_with_state(&*state, &last_version, &dataver);
        assert_eq!(dataver.get(), 1);
        assert_eq!(last_version.load(Ordering::SeqCst), state.version());
    }
}
