//! # Recurring Task Schedules
//!
//! One fixed-interval task per key, all hanging off a root
//! `CancellationToken`.
//!
//! ## Workflow:
//! 1.  `spawn_every` starts a task that ticks immediately and then every
//!     `period`. Each tick calls the supplied closure, which is expected to
//!     spawn or kick off its own work so a slow tick never delays the timer.
//! 2.  Each key gets a child token of the root token. `cancel(key)` stops one
//!     schedule, `cancel_all()` cancels the root and therefore every child.
//! 3.  After `cancel_all()` the root is replaced, so the same `Schedules` can
//!     be reused for a fresh set of tasks.
//!
//! Cancelling a schedule never aborts work a tick already started.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest period a schedule runs at.
pub const MIN_PERIOD: Duration = Duration::from_millis(100);

struct ScheduleState<K> {
    root: CancellationToken,
    tasks: HashMap<K, CancellationToken>,
}

/// # Schedules
///
/// Keyed collection of cancellable recurring tasks.
pub struct Schedules<K> {
    state: Mutex<ScheduleState<K>>,
}

impl<K> Default for Schedules<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Schedules<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// An empty set of schedules.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScheduleState {
                root: CancellationToken::new(),
                tasks: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScheduleState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts (or restarts) the schedule for `key`. Any schedule already
    /// running for `key` is cancelled first.
    ///
    /// Periods shorter than [`MIN_PERIOD`] are raised to it.
    pub fn spawn_every<F>(&self, key: K, period: Duration, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        let token = {
            let mut state = self.lock();
            let token = state.root.child_token();
            if let Some(previous) = state.tasks.insert(key.clone(), token.clone()) {
                previous.cancel();
            }
            token
        };

        if period < MIN_PERIOD {
            warn!(?key, period_ms = period.as_millis() as u64, "Schedule period too short, clamping");
        }
        let period = period.max(MIN_PERIOD);
        info!(?key, period_secs = period.as_secs_f64(), "Schedule started");

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(?key, "Schedule cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        tick();
                    }
                }
            }
        })
    }

    /// Stops the schedule for `key`. Returns `false` if none was running.
    pub fn cancel(&self, key: &K) -> bool {
        match self.lock().tasks.remove(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stops every schedule and arms a fresh root token.
    pub fn cancel_all(&self) {
        let mut state = self.lock();
        state.root.cancel();
        state.root = CancellationToken::new();
        state.tasks.clear();
    }

    /// Whether a schedule for `key` is registered.
    pub fn is_scheduled(&self, key: &K) -> bool {
        self.lock().tasks.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_immediately_then_every_period() {
        let schedules: Schedules<&'static str> = Schedules::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = schedules.spawn_every("current", Duration::from_secs(300), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        assert!(schedules.cancel(&"current"));
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_everything_and_allows_reuse() {
        let schedules: Schedules<u8> = Schedules::new();
        let a = schedules.spawn_every(1, Duration::from_secs(10), || {});
        let b = schedules.spawn_every(2, Duration::from_secs(10), || {});
        schedules.cancel_all();
        a.await.unwrap();
        b.await.unwrap();
        assert!(!schedules.is_scheduled(&1));

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let _c = schedules.spawn_every(1, Duration::from_secs(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert!(schedules.is_scheduled(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_clamped_instead_of_panicking() {
        let schedules: Schedules<&'static str> = Schedules::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = schedules.spawn_every("current", Duration::ZERO, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(MIN_PERIOD).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        assert!(schedules.cancel(&"current"));
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn respawning_a_key_replaces_the_old_task() {
        let schedules: Schedules<&'static str> = Schedules::new();
        let old = schedules.spawn_every("k", Duration::from_secs(10), || {});
        let _new = schedules.spawn_every("k", Duration::from_secs(10), || {});
        old.await.unwrap();
        assert!(schedules.is_scheduled(&"k"));
    }
}
