//! Shared callback storage.
//!
//! Accessories use it for their report callback, cluster states for the
//! hook that forwards controller writes to the owning device.

use parking_lot::RwLock;
use std::sync::Arc;

/// A parameterless notification callback.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Storage for a single optional callback.
#[derive(Default)]
pub struct CallbackSlot {
    callback: RwLock<Option<Callback>>,
}

impl CallbackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registered callback.
    pub fn set(&self, callback: Callback) {
        *self.callback.write() = Some(callback);
    }

    pub fn is_set(&self) -> bool {
        self.callback.read().is_some()
    }

    /// Invoke the callback if one is registered.
    ///
    /// The callback is cloned out of the lock first so it may re-enter
    /// whatever owns the slot.
    pub fn fire(&self) {
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fire_without_callback_is_noop() {
        let slot = CallbackSlot::new();
        assert!(!slot.is_set());
        slot.fire();
    }

    #[test]
    fn test_fire_invokes_latest_callback() {
        let slot = CallbackSlot::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        slot.set(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        slot.fire();

        let counter = second.clone();
        slot.set(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        slot.fire();
        slot.fire();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_may_reenter_slot() {
        let slot = Arc::new(CallbackSlot::new());
        let inner = slot.clone();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        slot.set(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            assert!(inner.is_set());
        }));
        slot.fire();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
