//! # Indicator Store
//!
//! Owns the current indicator snapshot and every tracked historical series,
//! and keeps them refreshed.
//!
//! ## Core Design:
//!
//! 1.  **Per-key state machine**: each `ResourceKey` moves through
//!     `Idle -> Loading -> (Success | Error) -> Loading -> ...`.
//!     `last_updated` only moves on success; a failure keeps the last good
//!     data and records the error.
//! 2.  **Coalescing**: a refresh for a key that is already loading joins the
//!     running fetch (`engine::registry`). Every joined caller receives the
//!     same result and the subscribers are notified once.
//! 3.  **Detached fetches**: each fetch runs in its own task, so it completes
//!     and is applied even if every caller stopped waiting.
//! 4.  **Atomic apply**: a result is applied under a single lock acquisition,
//!     and subscribers run after the lock is released.
//! 5.  **Ordering**: every fetch carries a sequence number. A result older than
//!     the last one applied for its key is dropped.
//! 6.  **Epochs**: `stop()` closes the current epoch. Results from a closed
//!     epoch are dropped, so nothing mutates the store after `stop()` and a
//!     later `start()` never sees a straggler from before.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::apicall::{IndicatorApi, IndicatorSource};
use super::model::{HistoricalPoint, Indicator, Payload, RefreshAck, ResourceKey};
use crate::engine::{Inflight, InflightRegistry, Schedules, Subscribers, Subscription};
use crate::retrieve::FetchError;
use crate::utils::freshness::{Freshness, FreshnessThresholds};

/// Result of one fetch, shared by every caller that joined it.
pub type FetchOutcome = Result<Payload, FetchError>;

/// Refresh period of the current snapshot.
pub const DEFAULT_CURRENT_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default refresh period of a tracked historical series.
pub const DEFAULT_HISTORICAL_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default history window, in days.
pub const DEFAULT_HISTORICAL_DAYS: u32 = 30;

/// # Store Config
///
/// Tuning knobs injected at construction.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Refresh period of the current snapshot.
    pub current_interval: Duration,
    /// Refresh period for historical series tracked without an explicit one.
    pub historical_interval: Duration,
    /// History window for series tracked without an explicit one.
    pub historical_days: u32,
    /// Freshness thresholds for `is_fresh` / `freshness`.
    pub thresholds: FreshnessThresholds,
    /// Extra deadline around every source call. `None` relies on the source's
    /// own timeout.
    pub fetch_timeout: Option<Duration>,
}

impl StoreConfig {
    /// Replaces zero periods, a zero window and a zero deadline with the
    /// defaults. A zero period cannot drive an interval timer.
    pub fn sanitized(mut self) -> Self {
        if self.current_interval.is_zero() {
            warn!("Zero current_interval, using the default");
            self.current_interval = DEFAULT_CURRENT_INTERVAL;
        }
        if self.historical_interval.is_zero() {
            warn!("Zero historical_interval, using the default");
            self.historical_interval = DEFAULT_HISTORICAL_INTERVAL;
        }
        if self.historical_days == 0 {
            self.historical_days = DEFAULT_HISTORICAL_DAYS;
        }
        if self.fetch_timeout.is_some_and(|t| t.is_zero()) {
            self.fetch_timeout = None;
        }
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            current_interval: DEFAULT_CURRENT_INTERVAL,
            historical_interval: DEFAULT_HISTORICAL_INTERVAL,
            historical_days: DEFAULT_HISTORICAL_DAYS,
            thresholds: FreshnessThresholds::default(),
            fetch_timeout: None,
        }
    }
}

/// Lifecycle of one resource key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    /// Never fetched.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last applied fetch succeeded.
    Success,
    /// The last applied fetch failed.
    Error,
}

/// # Resource Snapshot
///
/// Point-in-time view of one key's bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    /// Current lifecycle state.
    pub state: FetchState,
    /// Time of the last successful apply.
    pub last_updated: Option<DateTime<Utc>>,
    /// Error of the last applied fetch, cleared on success.
    pub error: Option<FetchError>,
    /// Sequence number of the last applied fetch.
    pub applied_seq: u64,
}

impl Default for ResourceSnapshot {
    fn default() -> Self {
        Self {
            state: FetchState::Idle,
            last_updated: None,
            error: None,
            applied_seq: 0,
        }
    }
}

impl ResourceSnapshot {
    /// The state this key settles back to once nothing is loading.
    fn settled(&self) -> FetchState {
        if self.error.is_some() {
            FetchState::Error
        } else if self.last_updated.is_some() {
            FetchState::Success
        } else {
            FetchState::Idle
        }
    }
}

/// # Store Event
///
/// Delivered to subscribers once per applied refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    /// The key that was refreshed.
    pub key: ResourceKey,
    /// `last_updated` of the key after the refresh.
    pub last_updated: Option<DateTime<Utc>>,
    /// The error, when the refresh failed.
    pub error: Option<FetchError>,
}

/// Parameters of one tracked historical series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedSeries {
    /// History window, in days.
    pub days: u32,
    /// Refresh period.
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Constructed, never started. Manual refreshes are applied.
    Ready,
    /// Schedules active.
    Running,
    /// Stopped. Nothing is applied until the next `start()`.
    Stopped,
}

struct StoreState {
    phase: Phase,
    epoch: u64,
    current: Arc<Vec<Indicator>>,
    historical: HashMap<String, Arc<Vec<HistoricalPoint>>>,
    resources: HashMap<ResourceKey, ResourceSnapshot>,
    tracked: HashMap<String, TrackedSeries>,
    /// Per untracked series, the last ticket issued before it was dropped.
    retired: HashMap<String, u64>,
}

struct Inner<S> {
    source: S,
    config: StoreConfig,
    state: Mutex<StoreState>,
    inflight: InflightRegistry<(u64, ResourceKey), FetchOutcome>,
    subscribers: Subscribers<StoreEvent>,
    schedules: Schedules<ResourceKey>,
}

/// # Indicator Store
///
/// Cheap to clone; clones share the same state.
pub struct IndicatorStore<S: IndicatorSource = IndicatorApi> {
    inner: Arc<Inner<S>>,
}

impl<S: IndicatorSource> Clone for IndicatorStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: IndicatorSource> std::fmt::Debug for IndicatorStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("IndicatorStore")
            .field("phase", &state.phase)
            .field("epoch", &state.epoch)
            .field("indicators", &state.current.len())
            .field("tracked", &state.tracked.len())
            .finish()
    }
}

impl<S: IndicatorSource> IndicatorStore<S> {
    /// A store over `source`. Nothing is fetched until `start()` or
    /// `refresh_now()`.
    pub fn new(source: S, config: StoreConfig) -> Self {
        let config = config.sanitized();
        Self {
            inner: Arc::new(Inner {
                source,
                config,
                state: Mutex::new(StoreState {
                    phase: Phase::Ready,
                    epoch: 0,
                    current: Arc::new(Vec::new()),
                    historical: HashMap::new(),
                    resources: HashMap::new(),
                    tracked: HashMap::new(),
                    retired: HashMap::new(),
                }),
                inflight: InflightRegistry::new(),
                subscribers: Subscribers::new(),
                schedules: Schedules::new(),
            }),
        }
    }

    /// The injected configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The injected source.
    pub fn source(&self) -> &S {
        &self.inner.source
    }

    // --- Lifecycle ---

    /// # Start
    ///
    /// Fetches every tracked key immediately, then keeps refreshing the
    /// current snapshot every `current_interval` and each tracked series at its
    /// own interval. Calling `start()` on a running store does nothing.
    pub fn start(&self) {
        let tracked: Vec<(String, TrackedSeries)> = {
            let mut state = self.inner.lock();
            if state.phase == Phase::Running {
                debug!("Store already running");
                return;
            }
            state.phase = Phase::Running;
            state.epoch += 1;
            info!(epoch = state.epoch, "Indicator store started");
            state.tracked.iter().map(|(id, t)| (id.clone(), *t)).collect()
        };

        Inner::schedule(&self.inner, ResourceKey::Current, self.inner.config.current_interval);
        for (id, series) in tracked {
            Inner::schedule(&self.inner, ResourceKey::Historical(id), series.interval);
        }
    }

    /// # Stop
    ///
    /// Cancels every schedule. Fetches already in flight run to completion,
    /// but their results are discarded.
    pub fn stop(&self) {
        {
            let mut state = self.inner.lock();
            if state.phase == Phase::Stopped {
                return;
            }
            state.phase = Phase::Stopped;
            state.epoch += 1;
            for resource in state.resources.values_mut() {
                if resource.state == FetchState::Loading {
                    resource.state = resource.settled();
                }
            }
            info!(epoch = state.epoch, "Indicator store stopped");
        }
        self.inner.schedules.cancel_all();
    }

    /// Whether schedules are running.
    pub fn is_running(&self) -> bool {
        self.inner.lock().phase == Phase::Running
    }

    // --- Refresh ---

    /// # Refresh Now
    ///
    /// Fetches `key` outside the schedule. If a fetch for `key` is already in
    /// flight this joins it instead of issuing another request.
    ///
    /// The result is returned even when the store is stopped, in which case it
    /// is not applied.
    pub async fn refresh_now(&self, key: ResourceKey) -> FetchOutcome {
        Inner::launch(&self.inner, key).future.await
    }

    /// Asks the upstream service to recompute its cache, then refreshes the
    /// current snapshot (joining any fetch already in flight).
    pub async fn request_upstream_refresh(&self) -> Result<RefreshAck, FetchError> {
        let ack = self.inner.source.request_refresh().await?;
        self.refresh_now(ResourceKey::Current).await?;
        Ok(ack)
    }

    /// # Track Historical
    ///
    /// Adds (or updates) a tracked series. `days` and `interval` default to
    /// the store config, and so do zero values. On a running store the series
    /// is fetched immediately and then scheduled.
    pub fn track_historical(&self, id: &str, days: Option<u32>, interval: Option<Duration>) {
        let series = TrackedSeries {
            days: days.filter(|d| *d > 0).unwrap_or(self.inner.config.historical_days),
            interval: interval
                .filter(|i| !i.is_zero())
                .unwrap_or(self.inner.config.historical_interval),
        };
        let running = {
            let mut state = self.inner.lock();
            state.tracked.insert(id.to_string(), series);
            state.phase == Phase::Running
        };
        debug!(id, days = series.days, "Tracking historical series");

        if running {
            Inner::schedule(&self.inner, ResourceKey::historical(id), series.interval);
        }
    }

    /// Stops tracking `id` and drops its series. Returns `false` if it was
    /// not tracked.
    ///
    /// A fetch for `id` still in flight runs to completion, but its result is
    /// not applied.
    pub fn untrack_historical(&self, id: &str) -> bool {
        let key = ResourceKey::historical(id);
        let (removed, epoch) = {
            let mut state = self.inner.lock();
            state.historical.remove(id);
            state.resources.remove(&key);
            state.retired.insert(id.to_string(), self.inner.inflight.last_ticket());
            (state.tracked.remove(id).is_some(), state.epoch)
        };
        self.inner.schedules.cancel(&key);
        self.inner.inflight.forget(&(epoch, key));
        if removed {
            debug!(id, "Stopped tracking historical series");
        }
        removed
    }

    /// Tracked series and their parameters.
    pub fn tracked_historical(&self) -> Vec<(String, TrackedSeries)> {
        let mut tracked: Vec<_> = self.inner.lock().tracked.iter().map(|(id, t)| (id.clone(), *t)).collect();
        tracked.sort_by(|a, b| a.0.cmp(&b.0));
        tracked
    }

    // --- Accessors ---

    /// The current indicator `id`, if the snapshot has it.
    pub fn get_current(&self, id: &str) -> Option<Indicator> {
        self.inner.lock().current.iter().find(|i| i.id == id).cloned()
    }

    /// The whole current snapshot.
    pub fn current(&self) -> Vec<Indicator> {
        self.inner.lock().current.as_ref().clone()
    }

    /// The stored series of `id`; empty if none was loaded.
    pub fn get_historical(&self, id: &str) -> Vec<HistoricalPoint> {
        self.inner
            .lock()
            .historical
            .get(id)
            .map(|points| points.as_ref().clone())
            .unwrap_or_default()
    }

    /// `true` when the current snapshot was refreshed within the fresh
    /// threshold.
    pub fn is_fresh(&self) -> bool {
        self.freshness() == Some(Freshness::Fresh)
    }

    /// Freshness of the current snapshot, `None` if it never loaded.
    pub fn freshness(&self) -> Option<Freshness> {
        self.freshness_of(&ResourceKey::Current)
    }

    /// Freshness of any key, `None` if it never loaded.
    pub fn freshness_of(&self, key: &ResourceKey) -> Option<Freshness> {
        let last_updated = self.inner.lock().resources.get(key)?.last_updated?;
        Some(Freshness::classify(last_updated, Utc::now(), &self.inner.config.thresholds))
    }

    /// Bookkeeping for `key`, `None` if it was never requested.
    pub fn state(&self, key: &ResourceKey) -> Option<ResourceSnapshot> {
        self.inner.lock().resources.get(key).cloned()
    }

    /// Error of the last applied fetch for `key`.
    pub fn last_error(&self, key: &ResourceKey) -> Option<FetchError> {
        self.inner.lock().resources.get(key)?.error.clone()
    }

    // --- Events ---

    /// Registers a callback run once per applied refresh.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<StoreEvent>
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }
}

impl<S> Inner<S> {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: IndicatorSource> Inner<S> {
    /// Starts the recurring refresh of `key`. The task holds a weak handle so
    /// it never keeps the store alive.
    fn schedule(this: &Arc<Self>, key: ResourceKey, period: Duration) {
        let weak: Weak<Self> = Arc::downgrade(this);
        let tick_key = key.clone();
        this.schedules.spawn_every(key, period, move || {
            if let Some(inner) = weak.upgrade() {
                // Detached: the fetch task applies its own result.
                let _ = Inner::launch(&inner, tick_key.clone());
            }
        });
    }

    /// Joins the in-flight fetch for `key` in the current epoch or spawns a
    /// new one. Fetches never coalesce across epochs.
    fn launch(this: &Arc<Self>, key: ResourceKey) -> Inflight<FetchOutcome> {
        let epoch = this.lock().epoch;
        let inner = Arc::clone(this);
        this.inflight.join_or_start(&(epoch, key), move |guard| {
            let seq = guard.ticket();
            let days = inner.begin_loading(&guard.key().1, epoch);
            let task = tokio::spawn(async move {
                let key = guard.key().1.clone();
                debug!(%key, seq, epoch, "Fetch started");
                let outcome = inner.fetch(&key, days).await;
                inner.apply(&key, epoch, seq, &outcome);
                drop(guard);
                outcome
            });
            async move {
                task.await
                    .unwrap_or_else(|e| Err(FetchError::Network(format!("refresh task failed: {e}"))))
            }
        })
    }

    /// Marks `key` as loading if `epoch` is still open, and returns the
    /// window to request for series.
    fn begin_loading(&self, key: &ResourceKey, epoch: u64) -> u32 {
        let mut state = self.lock();
        let days = match key {
            ResourceKey::Current => 0,
            ResourceKey::Historical(id) => state.tracked.get(id).map_or(self.config.historical_days, |t| t.days),
        };
        if state.phase != Phase::Stopped && state.epoch == epoch {
            state.resources.entry(key.clone()).or_default().state = FetchState::Loading;
        }
        days
    }

    async fn fetch(&self, key: &ResourceKey, days: u32) -> FetchOutcome {
        let work = async {
            match key {
                ResourceKey::Current => self.source.current().await.map(|items| Payload::Current(Arc::new(items))),
                ResourceKey::Historical(id) => self
                    .source
                    .historical(id, days)
                    .await
                    .map(|points| Payload::Historical(Arc::new(points))),
            }
        };

        match self.config.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .unwrap_or(Err(FetchError::Timeout(limit))),
            None => work.await,
        }
    }

    /// Applies `outcome` to `key` if its epoch is still open and it is newer
    /// than what was applied last, then notifies subscribers. Returns whether
    /// it was applied.
    fn apply(&self, key: &ResourceKey, epoch: u64, seq: u64, outcome: &FetchOutcome) -> bool {
        let event = {
            let mut state = self.lock();

            if state.phase == Phase::Stopped || state.epoch != epoch {
                debug!(%key, seq, epoch, "Discarding result from a closed epoch");
                return false;
            }

            if let ResourceKey::Historical(id) = key {
                if state.retired.get(id).is_some_and(|retired| seq <= *retired) {
                    debug!(%key, seq, "Discarding result for an untracked series");
                    return false;
                }
            }

            let resource = state.resources.entry(key.clone()).or_default();
            if seq <= resource.applied_seq {
                debug!(%key, seq, applied = resource.applied_seq, "Discarding out-of-order result");
                return false;
            }
            resource.applied_seq = seq;

            match outcome {
                Ok(payload) => {
                    resource.state = FetchState::Success;
                    resource.last_updated = Some(Utc::now());
                    resource.error = None;
                    let last_updated = resource.last_updated;

                    match (key, payload) {
                        (ResourceKey::Current, Payload::Current(items)) => {
                            state.current = Arc::clone(items);
                        }
                        (ResourceKey::Historical(id), Payload::Historical(points)) => {
                            state.historical.insert(id.clone(), Arc::clone(points));
                        }
                        _ => warn!(%key, "Payload does not match its key"),
                    }
                    info!(%key, items = payload.len(), "Refresh applied");

                    StoreEvent {
                        key: key.clone(),
                        last_updated,
                        error: None,
                    }
                }
                Err(e) => {
                    resource.state = FetchState::Error;
                    resource.error = Some(e.clone());
                    warn!(%key, kind = e.kind(), error = %e, "Refresh failed, keeping last good data");

                    StoreEvent {
                        key: key.clone(),
                        last_updated: resource.last_updated,
                        error: Some(e.clone()),
                    }
                }
            }
        };

        self.subscribers.broadcast(&event);
        true
    }
}

impl<S> Drop for Inner<S> {
    fn drop(&mut self) {
        self.schedules.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::format::Unit;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A source that replays queued results after a fixed delay.
    #[derive(Default)]
    struct Scripted {
        delay: Duration,
        current: Mutex<VecDeque<Result<Vec<Indicator>, FetchError>>>,
        history: Mutex<HashMap<String, Vec<HistoricalPoint>>>,
        current_calls: AtomicUsize,
        historical_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
    }

    impl Scripted {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn push(&self, result: Result<Vec<Indicator>, FetchError>) {
            self.current.lock().unwrap().push_back(result);
        }
    }

    impl IndicatorSource for Scripted {
        async fn current(&self) -> Result<Vec<Indicator>, FetchError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.current.lock().unwrap().pop_front();
            tokio::time::sleep(self.delay).await;
            next.unwrap_or_else(|| Err(FetchError::Network("script exhausted".to_string())))
        }

        async fn historical(&self, id: &str, days: u32) -> Result<Vec<HistoricalPoint>, FetchError> {
            self.historical_calls.fetch_add(1, Ordering::SeqCst);
            let points = self.history.lock().unwrap().get(id).cloned().unwrap_or_default();
            tokio::time::sleep(self.delay).await;
            Ok(crate::indicators::apicall::normalize_history(points, days))
        }

        async fn request_refresh(&self) -> Result<RefreshAck, FetchError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RefreshAck {
                message: Some("ok".to_string()),
                timestamp: None,
            })
        }
    }

    fn dolar_blue(value: f64) -> Vec<Indicator> {
        vec![Indicator::new("dolar_blue", value, Unit::Ars)]
    }

    fn counting(store: &IndicatorStore<Scripted>) -> (Arc<Mutex<Vec<StoreEvent>>>, Subscription<StoreEvent>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let sub = store.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        (events, sub)
    }

    #[tokio::test]
    async fn success_replaces_snapshot_and_notifies() {
        let source = Scripted::default();
        source.push(Ok(dolar_blue(1047.0)));
        let store = IndicatorStore::new(source, StoreConfig::default());
        let (events, _sub) = counting(&store);

        assert!(store.get_current("dolar_blue").is_none());
        assert!(!store.is_fresh());

        let payload = store.refresh_now(ResourceKey::Current).await.unwrap();
        assert_eq!(payload.len(), 1);

        let indicator = store.get_current("dolar_blue").unwrap();
        assert_eq!(indicator.value.as_f64(), Some(1047.0));
        assert_eq!(indicator.display(), "$1,047");
        assert!(store.is_fresh());
        assert_eq!(store.state(&ResourceKey::Current).unwrap().state, FetchState::Success);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, ResourceKey::Current);
        assert!(events[0].error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_request() {
        let source = Scripted::with_delay(Duration::from_millis(100));
        source.push(Ok(dolar_blue(1047.0)));
        source.push(Ok(dolar_blue(2000.0)));
        let store = IndicatorStore::new(source, StoreConfig::default());
        let (events, _sub) = counting(&store);

        let (a, b) = tokio::join!(
            store.refresh_now(ResourceKey::Current),
            store.refresh_now(ResourceKey::Current)
        );

        assert_eq!(store.source().current_calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_keeps_last_good_data() {
        let source = Scripted::default();
        source.push(Ok(dolar_blue(1047.0)));
        source.push(Err(FetchError::Application("upstream down".to_string())));
        let store = IndicatorStore::new(source, StoreConfig::default());
        let (events, _sub) = counting(&store);

        store.refresh_now(ResourceKey::Current).await.unwrap();
        let before = store.state(&ResourceKey::Current).unwrap();

        let err = store.refresh_now(ResourceKey::Current).await.unwrap_err();
        assert_eq!(err, FetchError::Application("upstream down".to_string()));

        assert_eq!(store.current(), dolar_blue(1047.0));
        let after = store.state(&ResourceKey::Current).unwrap();
        assert_eq!(after.state, FetchState::Error);
        assert_eq!(after.last_updated, before.last_updated);
        assert_eq!(store.last_error(&ResourceKey::Current), Some(err.clone()));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].error, Some(err));
        assert_eq!(events[1].last_updated, before.last_updated);
    }

    #[tokio::test(start_paused = true)]
    async fn source_deadline_maps_to_timeout() {
        let source = Scripted::with_delay(Duration::from_secs(60));
        source.push(Ok(dolar_blue(1047.0)));
        let config = StoreConfig {
            fetch_timeout: Some(Duration::from_secs(10)),
            ..StoreConfig::default()
        };
        let store = IndicatorStore::new(source, config);

        let err = store.refresh_now(ResourceKey::Current).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout(Duration::from_secs(10)));
        assert!(store.get_current("dolar_blue").is_none());
        assert!(!store.is_fresh());
        assert_eq!(store.freshness(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn start_fetches_immediately_then_on_interval() {
        let source = Scripted::default();
        source.push(Ok(dolar_blue(1.0)));
        source.push(Ok(dolar_blue(2.0)));
        let store = IndicatorStore::new(source, StoreConfig::default());

        store.start();
        assert!(store.is_running());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.source().current_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_current("dolar_blue").unwrap().value.as_f64(), Some(1.0));

        tokio::time::sleep(DEFAULT_CURRENT_INTERVAL).await;
        assert_eq!(store.source().current_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get_current("dolar_blue").unwrap().value.as_f64(), Some(2.0));

        store.stop();
        tokio::time::sleep(DEFAULT_CURRENT_INTERVAL * 3).await;
        assert_eq!(store.source().current_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn results_after_stop_are_discarded() {
        let source = Scripted::with_delay(Duration::from_secs(1));
        source.push(Ok(dolar_blue(1047.0)));
        let store = IndicatorStore::new(source, StoreConfig::default());
        let (events, _sub) = counting(&store);

        store.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.state(&ResourceKey::Current).unwrap().state, FetchState::Loading);

        store.stop();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(store.source().current_calls.load(Ordering::SeqCst), 1);
        assert!(store.current().is_empty());
        assert!(events.lock().unwrap().is_empty());
        assert_eq!(store.state(&ResourceKey::Current).unwrap().state, FetchState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_ignores_results_from_previous_epoch() {
        let source = Scripted::with_delay(Duration::from_secs(1));
        source.push(Ok(dolar_blue(1.0)));
        source.push(Ok(dolar_blue(2.0)));
        let store = IndicatorStore::new(source, StoreConfig::default());
        let (events, _sub) = counting(&store);

        store.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.stop();
        store.start();
        tokio::time::sleep(Duration::from_secs(2)).await;

        // The first fetch finished inside the new epoch but belonged to the
        // old one; only the second fetch is applied.
        assert_eq!(store.source().current_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get_current("dolar_blue").unwrap().value.as_f64(), Some(2.0));
        assert_eq!(events.lock().unwrap().len(), 1);
        store.stop();
    }

    #[test]
    fn stale_sequence_numbers_are_ignored() {
        let store = IndicatorStore::new(Scripted::default(), StoreConfig::default());
        let inner = &store.inner;

        assert!(inner.apply(&ResourceKey::Current, 0, 5, &Ok(Payload::Current(Arc::new(dolar_blue(5.0))))));
        assert!(!inner.apply(&ResourceKey::Current, 0, 3, &Ok(Payload::Current(Arc::new(dolar_blue(3.0))))));
        assert!(!inner.apply(&ResourceKey::Current, 7, 9, &Ok(Payload::Current(Arc::new(dolar_blue(9.0))))));

        assert_eq!(store.get_current("dolar_blue").unwrap().value.as_f64(), Some(5.0));
        assert_eq!(store.state(&ResourceKey::Current).unwrap().applied_seq, 5);
    }

    #[tokio::test]
    async fn historical_series_are_tracked_bounded_and_dropped() {
        let source = Scripted::default();
        let points: Vec<HistoricalPoint> = (1..=40)
            .rev()
            .map(|i| HistoricalPoint {
                date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Days::new(i),
                value: 1000.0 + i as f64,
                source: Some("BCRA".to_string()),
            })
            .collect();
        source.history.lock().unwrap().insert("riesgo_pais".to_string(), points);
        let store = IndicatorStore::new(source, StoreConfig::default());

        store.track_historical("riesgo_pais", Some(30), None);
        assert_eq!(
            store.tracked_historical(),
            vec![(
                "riesgo_pais".to_string(),
                TrackedSeries {
                    days: 30,
                    interval: DEFAULT_HISTORICAL_INTERVAL
                }
            )]
        );

        store.refresh_now(ResourceKey::historical("riesgo_pais")).await.unwrap();
        let series = store.get_historical("riesgo_pais");
        assert_eq!(series.len(), 30);
        assert!(series.windows(2).all(|w| w[0].date <= w[1].date));

        assert!(store.untrack_historical("riesgo_pais"));
        assert!(store.get_historical("riesgo_pais").is_empty());
        assert!(store.state(&ResourceKey::historical("riesgo_pais")).is_none());
        assert!(!store.untrack_historical("riesgo_pais"));
    }

    #[tokio::test(start_paused = true)]
    async fn untracking_during_a_fetch_keeps_the_series_dropped() {
        let source = Scripted::with_delay(Duration::from_secs(1));
        let points: Vec<HistoricalPoint> = (1..=5)
            .map(|i| HistoricalPoint {
                date: NaiveDate::from_ymd_opt(2025, 6, i).unwrap(),
                value: 1200.0 + f64::from(i),
                source: None,
            })
            .collect();
        source.history.lock().unwrap().insert("riesgo_pais".to_string(), points);
        let store = IndicatorStore::new(source, StoreConfig::default());
        let (events, _sub) = counting(&store);
        let key = ResourceKey::historical("riesgo_pais");

        store.track_historical("riesgo_pais", None, None);
        let (result, removed) = tokio::join!(store.refresh_now(key.clone()), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.untrack_historical("riesgo_pais")
        });

        assert!(removed);
        assert_eq!(result.unwrap().len(), 5);
        assert!(store.tracked_historical().is_empty());
        assert!(store.get_historical("riesgo_pais").is_empty());
        assert!(store.state(&key).is_none());
        assert!(events.lock().unwrap().is_empty());

        // Tracking again starts a new fetch whose result is applied.
        store.track_historical("riesgo_pais", None, None);
        store.refresh_now(key.clone()).await.unwrap();
        assert_eq!(store.source().historical_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get_historical("riesgo_pais").len(), 5);
        assert_eq!(store.state(&key).unwrap().state, FetchState::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_intervals_fall_back_to_defaults() {
        let source = Scripted::default();
        source.push(Ok(dolar_blue(1047.0)));
        let config = StoreConfig {
            current_interval: Duration::ZERO,
            historical_interval: Duration::ZERO,
            historical_days: 0,
            fetch_timeout: Some(Duration::ZERO),
            ..StoreConfig::default()
        };
        let store = IndicatorStore::new(source, config);
        assert_eq!(store.config().current_interval, DEFAULT_CURRENT_INTERVAL);
        assert_eq!(store.config().historical_interval, DEFAULT_HISTORICAL_INTERVAL);
        assert_eq!(store.config().historical_days, DEFAULT_HISTORICAL_DAYS);
        assert_eq!(store.config().fetch_timeout, None);

        store.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.source().current_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.state(&ResourceKey::Current).unwrap().state, FetchState::Success);

        store.track_historical("merval", Some(0), Some(Duration::ZERO));
        assert_eq!(
            store.tracked_historical()[0].1,
            TrackedSeries {
                days: DEFAULT_HISTORICAL_DAYS,
                interval: DEFAULT_HISTORICAL_INTERVAL
            }
        );
        store.stop();
    }

    #[tokio::test]
    async fn upstream_refresh_reloads_current() {
        let source = Scripted::default();
        source.push(Ok(dolar_blue(1047.0)));
        let store = IndicatorStore::new(source, StoreConfig::default());

        let ack = store.request_upstream_refresh().await.unwrap();
        assert_eq!(ack.message.as_deref(), Some("ok"));
        assert_eq!(store.source().refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.source().current_calls.load(Ordering::SeqCst), 1);
        assert!(store.get_current("dolar_blue").is_some());
    }

    #[tokio::test]
    async fn unsubscribed_callbacks_stop_receiving() {
        let source = Scripted::default();
        source.push(Ok(dolar_blue(1.0)));
        source.push(Ok(dolar_blue(2.0)));
        let store = IndicatorStore::new(source, StoreConfig::default());
        let (events, sub) = counting(&store);

        store.refresh_now(ResourceKey::Current).await.unwrap();
        assert!(sub.unsubscribe());
        store.refresh_now(ResourceKey::Current).await.unwrap();
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
