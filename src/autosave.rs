//! Debounced auto-save scheduler.
//!
//! Watches a store's dirty flag and flushes it through a caller-supplied
//! persistence closure once edits go quiet. Three states:
//!
//! - Idle: store clean, no timer armed
//! - Pending: dirty, debounce timer armed; further edits restart the window
//! - Saving: commit in flight; at most one at a time
//!
//! A commit failure is logged and the store stays dirty — the next edit
//! re-attempts, and the UI keeps showing the unsaved indicator. There is no
//! timer-driven retry. An edit landing while a commit is in flight re-arms
//! a fresh debounce cycle after the commit settles.
//!
//! The store's edit generation is captured before each commit and the dirty
//! flag is cleared only if it still matches afterwards, so an edit racing
//! the commit is never wiped unsaved.
//! Dropping the saver cancels any pending timer; nothing commits after the
//! consuming view is gone.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::error::SyncError;
use crate::store::{DirtyObservable, SubscriptionId};

/// Default idle window before a flush.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Buffered mutation signals; overflow is fine, one queued signal is enough.
const SIGNAL_BUFFER: usize = 8;

type PersistFuture = Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send>>;
type PersistFn = Box<dyn Fn() -> PersistFuture + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AutoSaveConfig {
    pub debounce: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

struct Shared {
    saving: AtomicBool,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
}

/// One scheduler per store instance. Dropping it detaches the store
/// subscription and cancels any pending flush.
pub struct AutoSaver {
    store: Arc<dyn DirtyObservable>,
    subscription: SubscriptionId,
    shared: Arc<Shared>,
    task: tokio::task::JoinHandle<()>,
}

impl AutoSaver {
    /// Spawn the scheduler for `store`, flushing through `persist`.
    ///
    /// `persist` is invoked with no arguments; it should serialize the
    /// store's current state itself (see [`crate::store::guest::GuestStore::persist`]).
    pub fn spawn<F, Fut>(
        store: Arc<dyn DirtyObservable>,
        config: AutoSaveConfig,
        persist: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SyncError>> + Send + 'static,
    {
        let persist: PersistFn = Box::new(move || Box::pin(persist()));
        let (signal_tx, signal_rx) = mpsc::channel::<()>(SIGNAL_BUFFER);

        // Weak back-reference: the store owns this callback, so a strong
        // Arc here would cycle and keep both alive forever.
        let weak = Arc::downgrade(&store);
        let subscription = store.subscribe(Box::new(move || {
            if let Some(store) = weak.upgrade() {
                if store.is_dirty() {
                    let _ = signal_tx.try_send(());
                }
            }
        }));

        let shared = Arc::new(Shared {
            saving: AtomicBool::new(false),
            last_saved_at: Mutex::new(None),
        });

        let task = tokio::spawn(run_loop(
            signal_rx,
            Arc::clone(&store),
            Arc::clone(&shared),
            persist,
            config.debounce,
        ));

        Self {
            store,
            subscription,
            shared,
            task,
        }
    }

    /// Whether a commit is currently in flight.
    pub fn is_saving(&self) -> bool {
        self.shared.saving.load(Ordering::SeqCst)
    }

    /// When the last successful commit finished, if any.
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_saved_at.lock()
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
        self.task.abort();
    }
}

async fn run_loop(
    mut signals: mpsc::Receiver<()>,
    store: Arc<dyn DirtyObservable>,
    shared: Arc<Shared>,
    persist: PersistFn,
    debounce: Duration,
) {
    // Re-enter the debounce phase directly after a save that raced an edit
    let mut rearm = false;

    loop {
        if !rearm {
            // Idle: wait for the first mutation signal
            if signals.recv().await.is_none() {
                break; // saver dropped
            }
        }
        rearm = false;

        // Pending: the window restarts from the *last* mutation
        loop {
            tokio::select! {
                _ = sleep(debounce) => break,
                more = signals.recv() => {
                    if more.is_none() {
                        return;
                    }
                }
            }
        }

        // A hydrate or mark_clean can fire signals worth of notifications
        // without leaving edits behind
        if !store.is_dirty() {
            continue;
        }

        // Saving: exactly one in-flight commit
        let generation = store.generation();
        shared.saving.store(true, Ordering::SeqCst);
        let result = persist().await;
        shared.saving.store(false, Ordering::SeqCst);

        // Signals still queued now arrived during the commit
        let mut raced = false;
        while signals.try_recv().is_ok() {
            raced = true;
        }

        match result {
            Ok(()) => {
                *shared.last_saved_at.lock() = Some(Utc::now());
                // Clearing is conditional on the pre-commit generation, so
                // an edit that raced the commit keeps the store dirty
                if store.mark_clean_at(generation) {
                    log::debug!("auto-save committed");
                } else {
                    log::debug!("auto-save ok, but edits arrived mid-commit; re-arming");
                    rearm = true;
                }
            }
            Err(e) => {
                // Deliberate fail-silently policy: the store stays dirty and
                // the UI keeps its unsaved indicator; the next edit retries
                log::warn!("auto-save failed, store stays dirty: {}", e);
                rearm = raced;
            }
        }
    }
}
