//! # In-flight Registry
//!
//! Tracks at most one running fetch per key. The fetch future is stored as a
//! `Shared` future so any number of callers can await the same outcome.
//!
//! ## Logic:
//! 1.  `join_or_start` looks the key up under the lock.
//!     - Present: the caller gets a clone of the existing shared future.
//!     - Absent: a new ticket is issued, the `start` closure builds the
//!       fetch future and it is stored before the lock is released.
//! 2.  The `start` closure receives an `InflightGuard`. Dropping the guard
//!    removes the slot, but only if the slot still carries the same ticket,
//!    so a late guard never evicts a newer fetch.
//!
//! Tickets come from one counter and strictly increase, which also makes
//! them usable as request sequence numbers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

/// A fetch that may be awaited by several callers.
pub type SharedFetch<V> = Shared<BoxFuture<'static, V>>;

struct Slot<V: Clone> {
    ticket: u64,
    future: SharedFetch<V>,
}

type Slots<K, V> = Arc<Mutex<HashMap<K, Slot<V>>>>;

fn lock_slots<K, V: Clone>(slots: &Mutex<HashMap<K, Slot<V>>>) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Inflight
///
/// What `join_or_start` hands back: the shared future plus the bookkeeping
/// needed to tell a leader from a follower.
pub struct Inflight<V: Clone> {
    /// The shared fetch. Await it to get the result.
    pub future: SharedFetch<V>,
    /// Ticket of the fetch that was started or joined.
    pub ticket: u64,
    /// `true` when an existing fetch was joined.
    pub joined: bool,
}

/// Removes its slot from the registry when dropped.
pub struct InflightGuard<K: Eq + Hash, V: Clone> {
    slots: Slots<K, V>,
    key: K,
    ticket: u64,
}

impl<K: Eq + Hash, V: Clone> InflightGuard<K, V> {
    /// Ticket issued to this fetch.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Key this fetch belongs to.
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash, V: Clone> Drop for InflightGuard<K, V> {
    fn drop(&mut self) {
        let mut slots = lock_slots(&self.slots);
        if slots.get(&self.key).is_some_and(|slot| slot.ticket == self.ticket) {
            slots.remove(&self.key);
        }
    }
}

impl<K: Eq + Hash + fmt::Debug, V: Clone> fmt::Debug for InflightGuard<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflightGuard").field("key", &self.key).field("ticket", &self.ticket).finish()
    }
}

/// # In-flight Registry
pub struct InflightRegistry<K, V: Clone> {
    slots: Slots<K, V>,
    next_ticket: AtomicU64,
}

impl<K, V> Default for InflightRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InflightRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Joins the running fetch for `key`, or starts one with `start`.
    ///
    /// `start` runs while the registry lock is held, so it must not call back
    /// into the registry. Spawning a task from it is fine.
    pub fn join_or_start<F, Fut>(&self, key: &K, start: F) -> Inflight<V>
    where
        F: FnOnce(InflightGuard<K, V>) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut slots = lock_slots(&self.slots);

        if let Some(slot) = slots.get(key) {
            return Inflight {
                future: slot.future.clone(),
                ticket: slot.ticket,
                joined: true,
            };
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        let guard = InflightGuard {
            slots: Arc::clone(&self.slots),
            key: key.clone(),
            ticket,
        };
        let future = start(guard).boxed().shared();
        slots.insert(key.clone(), Slot { ticket, future: future.clone() });

        Inflight { future, ticket, joined: false }
    }

    /// The most recently issued ticket, `0` before the first fetch.
    pub fn last_ticket(&self) -> u64 {
        self.next_ticket.load(Ordering::Relaxed)
    }

    /// Unregisters the fetch for `key` without cancelling it. Later callers
    /// start a new fetch instead of joining the old one.
    pub fn forget(&self, key: &K) -> bool {
        lock_slots(&self.slots).remove(key).is_some()
    }

    /// Whether a fetch for `key` is currently registered.
    pub fn is_inflight(&self, key: &K) -> bool {
        lock_slots(&self.slots).contains_key(key)
    }

    /// Number of registered fetches.
    pub fn len(&self) -> usize {
        lock_slots(&self.slots).len()
    }

    /// `true` when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
