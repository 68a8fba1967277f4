//! # Subscriber Dispatcher
//!
//! Fan-out of store events to registered callbacks.
//!
//! ## Core Design:
//! 1.  **Synchronous delivery**: `broadcast` calls every callback on the
//!     calling task before it returns.
//! 2.  **Lock-free delivery**: the callback list is snapshotted under the lock
//!     and the lock is released before any callback runs. A callback may
//!     subscribe or unsubscribe without deadlocking.
//! 3.  **Explicit removal**: a `Subscription` stays active until
//!     `unsubscribe` is called. Dropping the handle does nothing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Entries<E> = Mutex<Vec<(u64, Callback<E>)>>;

fn lock_entries<E>(entries: &Entries<E>) -> MutexGuard<'_, Vec<(u64, Callback<E>)>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Subscribers
///
/// A list of callbacks receiving `&E`.
pub struct Subscribers<E> {
    entries: Arc<Entries<E>>,
    next_id: AtomicU64,
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers").field("count", &self.len()).finish()
    }
}

impl<E> Subscribers<E> {
    /// An empty list.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers `callback` and returns its removal handle.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock_entries(&self.entries).push((id, Arc::new(callback)));
        debug!(subscriber = id, "Subscriber registered");
        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Delivers `event` to every callback registered at the time of the call.
    pub fn broadcast(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = lock_entries(&self.entries).iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of active subscribers.
    pub fn len(&self) -> usize {
        lock_entries(&self.entries).len()
    }

    /// `true` when nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`Subscribers::subscribe`].
pub struct Subscription<E> {
    id: u64,
    entries: Weak<Entries<E>>,
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<E> Subscription<E> {
    /// Removes the callback. Returns `false` if it was already gone, for
    /// example because the owning list was dropped.
    pub fn unsubscribe(self) -> bool {
        let Some(entries) = self.entries.upgrade() else {
            return false;
        };
        let mut entries = lock_entries(&entries);
        let before = entries.len();
        entries.retain(|(id, _)| *id != self.id);
        let removed = entries.len() != before;
        if removed {
            debug!(subscriber = self.id, "Subscriber removed");
        }
        removed
    }
}
