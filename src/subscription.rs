//! Observers and environment triggers.
//!
//! A [`Subscription`] is the handle a view holds while it is interested in a
//! key; dropping it unsubscribes. The [`SubscriptionManager`] creates
//! subscriptions, runs per-key poll timers, and turns "window focused" and
//! "network reconnected" signals into invalidations of observed keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::QueryCache;
use crate::entry::QueryState;
use crate::error::SyncError;
use crate::fetch::FetchCoordinator;
use crate::invalidation::{InvalidationBus, InvalidationCause, InvalidationReport};
use crate::key::{KeyFilter, QueryKey};
use crate::source::DataSource;
use crate::utils::{lock, spawn};

/// Live view of one cache entry.
///
/// Receives a notification on every visible state change of the entry. The
/// observer is released when the handle is dropped.
pub struct Subscription<V>
where
    V: Send + Sync + 'static,
{
    key: QueryKey,
    receiver: watch::Receiver<QueryState<V>>,
    cache: Weak<QueryCache<V>>,
}

impl<V> Subscription<V>
where
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        key: QueryKey,
        receiver: watch::Receiver<QueryState<V>>,
        cache: Weak<QueryCache<V>>,
    ) -> Self {
        Subscription {
            key,
            receiver,
            cache,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The latest state, without marking it seen.
    pub fn current(&self) -> QueryState<V> {
        self.receiver.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<V>> {
        self.receiver.borrow().data.clone()
    }

    /// A notification arrived that has not been consumed by [`changed`](Self::changed).
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next notification and return the new state.
    ///
    /// Fails with [`SyncError::Closed`] once the entry has been removed.
    pub async fn changed(&mut self) -> Result<QueryState<V>, SyncError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| SyncError::Closed)?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the entry reaches `Success` or `Error`.
    pub async fn settled(&mut self) -> Result<QueryState<V>, SyncError> {
        let state = self
            .receiver
            .wait_for(|state| state.is_settled())
            .await
            .map_err(|_| SyncError::Closed)?;
        Ok(state.clone())
    }

    /// Stop observing. Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl<V> Drop for Subscription<V>
where
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.unsubscribe(&self.key);
        }
    }
}

/// Binds observers to the cache and drives refetch triggers.
pub struct SubscriptionManager<V> {
    fetcher: FetchCoordinator<V>,
    bus: InvalidationBus<V>,
    pollers: Mutex<HashMap<QueryKey, AbortHandle>>,
}

impl<V> SubscriptionManager<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(fetcher: FetchCoordinator<V>) -> Self {
        SubscriptionManager {
            bus: InvalidationBus::new(fetcher.clone()),
            fetcher,
            pollers: Mutex::new(HashMap::new()),
        }
    }

    /// Register an observer of `key`, starting a fetch if the entry needs one.
    pub fn observe(&self, key: QueryKey) -> Subscription<V> {
        let cache = self.fetcher.cache();
        let outcome = cache.subscribe(&key);
        if let Some(ticket) = outcome.fetch {
            self.fetcher.start(ticket);
        }
        if outcome.first_observer
            && let Some(interval) = outcome.config.poll_interval()
        {
            self.start_polling(&key, interval);
        }
        Subscription::new(key, outcome.receiver, Arc::downgrade(cache))
    }

    /// The window regained focus: revalidate observed keys that opt in.
    pub fn window_focused(&self) -> InvalidationReport {
        info!("window focus regained");
        self.bus.dispatch(&KeyFilter::All, InvalidationCause::WindowFocus)
    }

    /// The network came back: revalidate observed keys that opt in.
    pub fn network_reconnected(&self) -> InvalidationReport {
        info!("network reconnected");
        self.bus.dispatch(&KeyFilter::All, InvalidationCause::Reconnect)
    }

    /// Number of poll timers still running.
    pub fn active_pollers(&self) -> usize {
        lock(&self.pollers)
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Stop every poll timer.
    pub fn stop_polling(&self) {
        for (_, handle) in lock(&self.pollers).drain() {
            handle.abort();
        }
    }

    fn start_polling(&self, key: &QueryKey, interval: Duration) {
        let mut pollers = lock(&self.pollers);
        if pollers.get(key).is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let task = run_poller(
            Arc::downgrade(self.fetcher.cache()),
            Arc::clone(self.fetcher.source()),
            key.clone(),
            interval,
        );
        if let Some(handle) = spawn("poll", task) {
            debug!(key = %key, interval_ms = interval.as_millis() as u64, "poller started");
            pollers.insert(key.clone(), handle);
        }
    }
}

impl<V> Drop for SubscriptionManager<V> {
    fn drop(&mut self) {
        for (_, handle) in lock(&self.pollers).drain() {
            handle.abort();
        }
    }
}

/// Revalidate `key` every `interval` while it has observers.
async fn run_poller<V>(
    cache: Weak<QueryCache<V>>,
    source: Arc<dyn DataSource<V>>,
    key: QueryKey,
    interval: Duration,
) where
    V: Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let filter = KeyFilter::Exact(key.clone());

    loop {
        ticker.tick().await;
        let Some(cache) = cache.upgrade() else {
            return;
        };
        if !cache.has_observers(&key) {
            debug!(key = %key, "poller stopped, no observers");
            return;
        }
        let bus = InvalidationBus::new(FetchCoordinator::new(cache, Arc::clone(&source)));
        bus.dispatch(&filter, InvalidationCause::Poll);
    }
}
