//! Shared store interior: locked state, dirty flag, subscriber registry.
//!
//! Every feature store wraps a [`StoreCore`] around its own state struct.
//! The core enforces the store contract in one place:
//!
//! - `hydrate` bulk-assigns fetched data and never touches the dirty flag
//! - `mutate` applies an edit and marks the store dirty only when the edit
//!   actually changed something (no-op edits stay clean)
//! - `mark_clean` is reserved for a confirmed persistence round-trip
//!
//! Subscribers are notified synchronously after every state change, with
//! both the state lock and the subscriber registry released, so a callback
//! can read or even edit the store it observes. Stores are constructed once
//! at application start and shared by `Arc`; every consumer sees the same
//! state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Change-notification callback registered by a store consumer.
pub type Callback = Box<dyn Fn() + Send + Sync>;

type SharedCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`StoreCore::subscribe`]; pass back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Dirty-flag view of a store, the seam the auto-saver works through.
pub trait DirtyObservable: Send + Sync {
    /// Whether the store holds unsaved edits.
    fn is_dirty(&self) -> bool;

    /// Monotonic count of applied edits, for detecting edits that race a
    /// persistence commit.
    fn generation(&self) -> u64;

    /// Clear the dirty flag after a confirmed successful persistence.
    fn mark_clean(&self);

    /// Clear the dirty flag only if no edit was applied since `generation`
    /// was read. Returns whether the flag was cleared.
    fn mark_clean_at(&self, generation: u64) -> bool;

    /// Register a change callback. Fires after every mutation or hydrate.
    fn subscribe(&self, callback: Callback) -> SubscriptionId;

    /// Remove a previously registered callback. Unknown ids are no-ops.
    fn unsubscribe(&self, id: SubscriptionId);
}

pub(crate) struct StoreCore<S> {
    inner: RwLock<Inner<S>>,
    subscribers: Mutex<Vec<(SubscriptionId, SharedCallback)>>,
    next_subscription: AtomicU64,
    generation: AtomicU64,
}

struct Inner<S> {
    state: S,
    dirty: bool,
}

impl<S> StoreCore<S> {
    pub fn new(state: S) -> Self {
        Self {
            inner: RwLock::new(Inner { state, dirty: false }),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            generation: AtomicU64::new(0),
        }
    }

    /// Read a view of the state under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.read().state)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    /// Count of applied edits since construction. Resets do not rewind it.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Bulk-assign fetched data. Never changes the dirty flag.
    pub fn hydrate(&self, f: impl FnOnce(&mut S)) {
        {
            let mut inner = self.inner.write();
            f(&mut inner.state);
        }
        self.notify();
    }

    /// Apply an edit. The closure returns whether it changed anything;
    /// only an applied edit marks the store dirty and notifies.
    pub fn mutate(&self, f: impl FnOnce(&mut S) -> bool) {
        let applied = {
            let mut inner = self.inner.write();
            let applied = f(&mut inner.state);
            if applied {
                inner.dirty = true;
                self.generation.fetch_add(1, Ordering::SeqCst);
            }
            applied
        };
        if applied {
            self.notify();
        }
    }

    pub fn mark_clean(&self) {
        {
            let mut inner = self.inner.write();
            if !inner.dirty {
                return;
            }
            inner.dirty = false;
        }
        self.notify();
    }

    /// Clear the dirty flag only if the generation still matches; a
    /// mismatch means an edit raced the commit and must stay pending.
    pub fn mark_clean_at(&self, generation: u64) -> bool {
        let cleared = {
            let mut inner = self.inner.write();
            if !inner.dirty || self.generation.load(Ordering::SeqCst) != generation {
                false
            } else {
                inner.dirty = false;
                true
            }
        };
        if cleared {
            self.notify();
        }
        cleared
    }

    /// Restore the documented initial state and clear the dirty flag.
    pub fn reset(&self, initial: S) {
        {
            let mut inner = self.inner.write();
            inner.state = initial;
            inner.dirty = false;
        }
        self.notify();
    }

    pub fn subscribe(&self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::from(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().retain(|(sub_id, _)| *sub_id != id);
    }

    fn notify(&self) {
        // Snapshot the registry and invoke with every lock released: a
        // callback may read or edit the store, or manage subscriptions,
        // without re-entering either lock. A callback unsubscribed from
        // inside this pass may still fire once within it.
        let subscribers: Vec<SharedCallback> = {
            let registered = self.subscribers.lock();
            registered.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in subscribers {
            callback();
        }
    }
}

/// Replace an element matching `id` in an ordered collection.
///
/// Returns false (leaving the collection untouched) when no element
/// matches: invalid-id updates are silent no-ops by contract.
pub(crate) fn replace_by_id<T>(
    items: &mut [T],
    matches: impl Fn(&T) -> bool,
    update: impl FnOnce(&mut T),
) -> bool {
    match items.iter_mut().find(|item| matches(item)) {
        Some(item) => {
            update(item);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_hydrate_does_not_dirty() {
        let core = StoreCore::new(0u32);
        core.hydrate(|n| *n = 42);
        assert_eq!(core.read(|n| *n), 42);
        assert!(!core.is_dirty());
    }

    #[test]
    fn test_mutate_dirties_and_mark_clean_clears() {
        let core = StoreCore::new(0u32);
        core.mutate(|n| {
            *n = 1;
            true
        });
        assert!(core.is_dirty());
        core.mark_clean();
        assert!(!core.is_dirty());
    }

    #[test]
    fn test_noop_mutation_stays_clean() {
        let core = StoreCore::new(0u32);
        core.mutate(|_| false);
        assert!(!core.is_dirty());
    }

    #[test]
    fn test_hydrate_preserves_existing_dirty_flag() {
        let core = StoreCore::new(0u32);
        core.mutate(|n| {
            *n = 1;
            true
        });
        core.hydrate(|n| *n = 2);
        assert!(core.is_dirty(), "hydrate must not clear pending edits");
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let core = StoreCore::new(0u32);
        core.mutate(|n| {
            *n = 7;
            true
        });
        core.reset(0);
        assert_eq!(core.read(|n| *n), 0);
        assert!(!core.is_dirty());
    }

    #[test]
    fn test_subscribers_fire_on_change_and_can_read_state() {
        let core = Arc::new(StoreCore::new(0u32));
        let fired = Arc::new(AtomicUsize::new(0));

        let observed = Arc::clone(&core);
        let count = Arc::clone(&fired);
        let id = core.subscribe(Box::new(move || {
            // Reading from inside the callback must not deadlock
            let _ = observed.read(|n| *n);
            count.fetch_add(1, Ordering::SeqCst);
        }));

        core.mutate(|n| {
            *n = 1;
            true
        });
        core.hydrate(|n| *n = 2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        core.unsubscribe(id);
        core.mutate(|n| {
            *n = 3;
            true
        });
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscriber_may_mutate_without_deadlock() {
        let core = Arc::new(StoreCore::new(0u32));
        let observed = Arc::clone(&core);
        core.subscribe(Box::new(move || {
            // One follow-up edit from inside the notification
            observed.mutate(|n| {
                if *n == 1 {
                    *n = 2;
                    true
                } else {
                    false
                }
            });
        }));

        core.mutate(|n| {
            *n = 1;
            true
        });
        assert_eq!(core.read(|n| *n), 2);
    }

    #[test]
    fn test_generation_counts_applied_edits_only() {
        let core = StoreCore::new(0u32);
        assert_eq!(core.generation(), 0);

        core.mutate(|n| {
            *n = 1;
            true
        });
        core.mutate(|_| false);
        core.hydrate(|n| *n = 2);
        assert_eq!(core.generation(), 1);
    }

    #[test]
    fn test_mark_clean_at_refuses_stale_generation() {
        let core = StoreCore::new(0u32);
        core.mutate(|n| {
            *n = 1;
            true
        });
        let generation = core.generation();
        core.mutate(|n| {
            *n = 2;
            true
        });

        assert!(!core.mark_clean_at(generation), "an edit landed since the read");
        assert!(core.is_dirty());
        assert!(core.mark_clean_at(core.generation()));
        assert!(!core.is_dirty());
    }

    #[test]
    fn test_noop_mutation_does_not_notify() {
        let core = StoreCore::new(0u32);
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        core.subscribe(Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }));

        core.mutate(|_| false);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
