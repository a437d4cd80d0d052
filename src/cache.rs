//! The query cache.
//!
//! `QueryCache` owns every [`CacheEntry`]. Each operation takes the state lock,
//! runs to completion and releases it before returning, so no two operations
//! interleave. Nothing is awaited while the lock is held.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::config::{ClientConfig, QueryConfig};
use crate::entry::{CacheEntry, InFlight, QueryState, QueryStatus, RequestId};
use crate::error::SyncError;
use crate::invalidation::InvalidationCause;
use crate::key::{KeyFilter, QueryKey};
use crate::policy;
use crate::utils::{lock, spawn};

/// A fetch the coordinator must start.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub key: QueryKey,
    pub request_id: RequestId,
    pub config: QueryConfig,
}

/// Result of registering an observer.
pub(crate) struct SubscribeOutcome<V> {
    pub receiver: watch::Receiver<QueryState<V>>,
    pub fetch: Option<FetchTicket>,
    /// The observer count went from zero to one.
    pub first_observer: bool,
    pub config: QueryConfig,
}

/// Entries touched by an invalidation.
#[derive(Debug, Default)]
pub(crate) struct StaleMarks {
    pub matched: usize,
    /// Matched entries with at least one observer.
    pub observed: Vec<QueryKey>,
}

struct GcTicket {
    key: QueryKey,
    epoch: u64,
    window: Duration,
}

struct CacheState<V> {
    entries: HashMap<QueryKey, CacheEntry<V>>,
    next_request_id: u64,
}

/// Explicitly owned cache of query entries.
pub struct QueryCache<V> {
    config: ClientConfig,
    state: Mutex<CacheState<V>>,
}

impl<V> QueryCache<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(config: ClientConfig) -> Self {
        QueryCache {
            config,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_request_id: 0,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, CacheState<V>> {
        lock(&self.state)
    }

    /// Return the current state of an entry. Never triggers a fetch.
    pub fn get(&self, key: &QueryKey) -> Option<QueryState<V>> {
        let state = self.state();
        let snapshot = state.entries.get(key).map(CacheEntry::snapshot);
        trace!(key = %key, hit = snapshot.is_some(), "cache lookup");
        snapshot
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.state().entries.keys().cloned().collect()
    }

    pub fn has_observers(&self, key: &QueryKey) -> bool {
        self.state()
            .entries
            .get(key)
            .is_some_and(|entry| entry.observer_count > 0)
    }

    /// Register an observer of `key`, creating the entry if absent.
    ///
    /// If the entry has no fresh data and no fetch outstanding, a fetch is
    /// started and returned as a ticket for the coordinator.
    pub(crate) fn subscribe(&self, key: &QueryKey) -> SubscribeOutcome<V> {
        let now = Instant::now();
        let mut guard = self.state();
        let CacheState {
            entries,
            next_request_id,
        } = &mut *guard;

        let entry = entries.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, "cache entry created");
            CacheEntry::new(key.clone(), self.config.config_for(key.kind()))
        });
        entry.observer_count += 1;
        // cancels any pending collection
        entry.gc_epoch += 1;

        let needs_fetch = policy::should_fetch(
            entry.data.is_some(),
            entry.stale_at,
            entry.in_flight.is_some(),
            now,
        );
        let fetch = if needs_fetch {
            start_fetch(entry, next_request_id, false)
        } else {
            debug!(key = %key, in_flight = entry.in_flight.is_some(), "subscriber joined without fetch");
            None
        };
        entry.publish_quietly();

        SubscribeOutcome {
            receiver: entry.receiver(),
            fetch,
            first_observer: entry.observer_count == 1,
            config: entry.config.clone(),
        }
    }

    /// Drop one observer of `key`. The last one out schedules removal after
    /// the entry's gc window.
    pub(crate) fn unsubscribe(self: &Arc<Self>, key: &QueryKey) {
        let ticket = {
            let mut state = self.state();
            let Some(entry) = state.entries.get_mut(key) else {
                return;
            };
            entry.observer_count = entry.observer_count.saturating_sub(1);
            entry.publish_quietly();
            if entry.observer_count > 0 {
                return;
            }
            debug!(key = %key, gc_ms = entry.config.gc_ms, "last observer left");
            arm_gc(entry)
        };
        self.schedule_gc(ticket);
    }

    /// Store `data` as the latest successful payload of `key` and notify
    /// subscribers.
    pub fn write(self: &Arc<Self>, key: &QueryKey, data: V) {
        let ticket = {
            let mut state = self.state();
            let entry = state.entries.entry(key.clone()).or_insert_with(|| {
                CacheEntry::new(key.clone(), self.config.config_for(key.kind()))
            });
            entry.set_data(Arc::new(data), Instant::now());
            entry.notify();
            debug!(key = %key, "cache write");
            (entry.observer_count == 0).then(|| arm_gc(entry))
        };
        if let Some(ticket) = ticket {
            self.schedule_gc(ticket);
        }
    }

    /// Record `error` on `key`. Data from an earlier success is kept.
    pub fn write_error(&self, key: &QueryKey, error: SyncError) {
        let mut state = self.state();
        if let Some(entry) = state.entries.get_mut(key) {
            debug!(key = %key, error = %error, "cache write error");
            entry.set_error(error);
            entry.notify();
        }
    }

    /// Start a fetch for an existing entry.
    ///
    /// Without `supersede` an outstanding fetch is joined and `None` returned.
    /// With it, the outstanding fetch is aborted and replaced; its result, if
    /// it still arrives, no longer matches and is discarded.
    pub(crate) fn begin_fetch(&self, key: &QueryKey, supersede: bool) -> Option<FetchTicket> {
        let mut guard = self.state();
        let CacheState {
            entries,
            next_request_id,
        } = &mut *guard;
        let entry = entries.get_mut(key)?;
        start_fetch(entry, next_request_id, supersede)
    }

    /// Remember the task running request `id` so it can be aborted.
    pub(crate) fn attach_task(&self, key: &QueryKey, id: RequestId, task: AbortHandle) {
        let mut state = self.state();
        if let Some(in_flight) = state
            .entries
            .get_mut(key)
            .and_then(|entry| entry.in_flight.as_mut())
            .filter(|in_flight| in_flight.id == id)
        {
            in_flight.task = Some(task);
        }
    }

    /// Count a failed attempt of request `id`.
    ///
    /// Returns false when the request is no longer current and must stop.
    pub(crate) fn record_failure(&self, key: &QueryKey, id: RequestId, failures: u32) -> bool {
        let mut state = self.state();
        match state.entries.get_mut(key) {
            Some(entry) if entry.request_id() == Some(id) => {
                entry.failure_count = failures;
                entry.publish_quietly();
                true
            }
            _ => false,
        }
    }

    /// Apply the outcome of request `id`.
    ///
    /// The outcome is applied only if `id` is still the entry's in-flight
    /// request; otherwise it is discarded and false is returned.
    pub(crate) fn complete_fetch(
        self: &Arc<Self>,
        key: &QueryKey,
        id: RequestId,
        result: Result<V, SyncError>,
    ) -> bool {
        let ticket = {
            let mut state = self.state();
            let Some(entry) = state.entries.get_mut(key) else {
                debug!(key = %key, request_id = %id, "response for removed entry discarded");
                return false;
            };
            if entry.request_id() != Some(id) {
                debug!(
                    key = %key,
                    request_id = %id,
                    current = ?entry.request_id(),
                    "superseded response discarded"
                );
                return false;
            }
            // the task is finishing on its own, nothing to abort
            entry.in_flight = None;
            match result {
                Ok(data) => {
                    entry.set_data(Arc::new(data), Instant::now());
                    debug!(key = %key, request_id = %id, "fetch applied");
                }
                Err(error) => {
                    entry.failure_count += 1;
                    debug!(key = %key, request_id = %id, error = %error, "fetch failed");
                    entry.set_error(error);
                }
            }
            entry.notify();
            (entry.observer_count == 0).then(|| arm_gc(entry))
        };
        if let Some(ticket) = ticket {
            self.schedule_gc(ticket);
        }
        true
    }

    /// Mark matching entries stale.
    ///
    /// Manual invalidation touches every match. Environment triggers only
    /// touch observed entries whose config enables that trigger.
    pub(crate) fn mark_stale(&self, filter: &KeyFilter, cause: InvalidationCause) -> StaleMarks {
        let now = Instant::now();
        let mut state = self.state();
        let mut marks = StaleMarks::default();

        for entry in state.entries.values_mut() {
            if !filter.matches(&entry.key) {
                continue;
            }
            let observed = entry.observer_count > 0;
            if cause.observed_only() && !(observed && cause.applies_to(&entry.config)) {
                continue;
            }
            marks.matched += 1;
            if entry.fetched_at.is_some() {
                entry.stale_at = Some(now);
                entry.publish_quietly();
            }
            if observed {
                marks.observed.push(entry.key.clone());
            }
        }

        debug!(
            filter = %filter,
            cause = ?cause,
            matched = marks.matched,
            observed = marks.observed.len(),
            "entries marked stale"
        );
        marks
    }

    /// Remove an entry, aborting its fetch. Subscribers see the channel close.
    pub fn remove(&self, key: &QueryKey) -> bool {
        let removed = self.state().entries.remove(key);
        if removed.is_some() {
            debug!(key = %key, "cache entry removed");
        }
        removed.is_some()
    }

    /// Drop every entry and abort every outstanding fetch.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut self.state().entries);
        info!(entries = entries.len(), "query cache cleared");
    }

    fn schedule_gc(self: &Arc<Self>, ticket: GcTicket) {
        let cache: Weak<Self> = Arc::downgrade(self);
        spawn("gc", async move {
            tokio::time::sleep(ticket.window).await;
            if let Some(cache) = cache.upgrade() {
                cache.collect(&ticket.key, ticket.epoch);
            }
        });
    }

    /// Remove `key` if it is still unobserved since `epoch` was armed.
    fn collect(&self, key: &QueryKey, epoch: u64) {
        let mut state = self.state();
        let Some(entry) = state.entries.get(key) else {
            return;
        };
        if entry.observer_count > 0 || entry.gc_epoch != epoch {
            return;
        }
        if entry.in_flight.is_some() {
            // re-armed when the fetch completes
            trace!(key = %key, "gc deferred, fetch in flight");
            return;
        }
        state.entries.remove(key);
        debug!(key = %key, "unobserved entry collected");
    }
}

fn start_fetch<V>(
    entry: &mut CacheEntry<V>,
    next_request_id: &mut u64,
    supersede: bool,
) -> Option<FetchTicket> {
    if let Some(current) = entry.request_id() {
        if !supersede {
            return None;
        }
        entry.cancel_in_flight();
        debug!(key = %entry.key, superseded = %current, "in-flight fetch superseded");
    }

    *next_request_id += 1;
    let request_id = RequestId(*next_request_id);
    entry.in_flight = Some(InFlight {
        id: request_id,
        task: None,
    });
    entry.status = QueryStatus::Loading;
    entry.failure_count = 0;
    entry.notify();

    Some(FetchTicket {
        key: entry.key.clone(),
        request_id,
        config: entry.config.clone(),
    })
}

fn arm_gc<V>(entry: &mut CacheEntry<V>) -> GcTicket {
    entry.gc_epoch += 1;
    GcTicket {
        key: entry.key.clone(),
        epoch: entry.gc_epoch,
        window: entry.config.gc_window(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(config: QueryConfig) -> Arc<QueryCache<String>> {
        Arc::new(QueryCache::new(ClientConfig::new(config)))
    }

    fn key() -> QueryKey {
        QueryKey::new(["item", "42"])
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_creates_entry_and_starts_fetch() {
        let cache = cache(QueryConfig::default());
        assert!(cache.get(&key()).is_none());

        let outcome = cache.subscribe(&key());
        let ticket = outcome.fetch.expect("fetch started");
        assert!(outcome.first_observer);

        let state = cache.get(&key()).unwrap();
        assert_eq!(state.status, QueryStatus::Loading);
        assert_eq!(state.observer_count, 1);
        assert_eq!(state.request_id, Some(ticket.request_id));
        assert!(state.data.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn second_subscriber_joins_in_flight_fetch() {
        let cache = cache(QueryConfig::default());
        let first = cache.subscribe(&key());
        let second = cache.subscribe(&key());

        assert!(first.fetch.is_some());
        assert!(second.fetch.is_none());
        assert!(!second.first_observer);
        assert_eq!(cache.get(&key()).unwrap().observer_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn write_then_get_returns_data_and_is_fresh() {
        let cache = cache(QueryConfig::default().with_stale_ms(10_000));
        cache.write(&key(), "payload".to_string());

        let state = cache.get(&key()).unwrap();
        assert_eq!(state.data.as_deref().map(String::as_str), Some("payload"));
        assert_eq!(state.status, QueryStatus::Success);
        assert!(state.is_fresh(Instant::now()));
        assert!(!state.is_fresh(state.stale_at.unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_does_not_refetch_on_subscribe() {
        let cache = cache(QueryConfig::default().with_stale_ms(10_000));
        cache.write(&key(), "payload".to_string());

        let outcome = cache.subscribe(&key());
        assert!(outcome.fetch.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_response_is_discarded() {
        let cache = cache(QueryConfig::default());
        let first = cache.subscribe(&key()).fetch.unwrap();
        let second = cache.begin_fetch(&key(), true).unwrap();
        assert_ne!(first.request_id, second.request_id);

        let applied = cache.complete_fetch(&key(), first.request_id, Ok("old".to_string()));
        assert!(!applied);
        let state = cache.get(&key()).unwrap();
        assert!(state.data.is_none());
        assert_eq!(state.status, QueryStatus::Loading);
        assert_eq!(state.request_id, Some(second.request_id));

        assert!(cache.complete_fetch(&key(), second.request_id, Ok("new".to_string())));
        let state = cache.get(&key()).unwrap();
        assert_eq!(state.data.as_deref().map(String::as_str), Some("new"));
        assert_eq!(state.status, QueryStatus::Success);
        assert!(state.request_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_previous_data() {
        let cache = cache(QueryConfig::default());
        cache.write(&key(), "good".to_string());
        let ticket = cache.subscribe(&key()).fetch.unwrap();

        cache.complete_fetch(&key(), ticket.request_id, Err(SyncError::network("down")));
        let state = cache.get(&key()).unwrap();
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(state.data.as_deref().map(String::as_str), Some("good"));
        assert_eq!(state.error, Some(SyncError::network("down")));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_stale_keeps_data_and_reports_observed() {
        let cache = cache(QueryConfig::default().with_stale_ms(60_000));
        let observed = QueryKey::new(["items", "category", "Textbooks"]);
        let unobserved = QueryKey::new(["items", "category", "Furniture"]);
        let other = QueryKey::new(["item", "42"]);
        for k in [&observed, &unobserved, &other] {
            cache.write(k, format!("data for {}", k));
        }
        let _outcome = cache.subscribe(&observed);

        let marks = cache.mark_stale(&KeyFilter::prefix(["items"]), InvalidationCause::Manual);
        assert_eq!(marks.matched, 2);
        assert_eq!(marks.observed, vec![observed.clone()]);

        let now = Instant::now();
        for k in [&observed, &unobserved] {
            let state = cache.get(k).unwrap();
            assert!(!state.is_fresh(now));
            assert!(state.data.is_some());
        }
        assert!(cache.get(&other).unwrap().is_fresh(now));
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_skip_unobserved_and_disabled_entries() {
        let config = ClientConfig::new(QueryConfig::default().with_stale_ms(60_000)).with_kind(
            "item",
            QueryConfig::default()
                .with_stale_ms(60_000)
                .with_refetch_on_reconnect(false),
        );
        let cache = Arc::new(QueryCache::<String>::new(config));
        let store = QueryKey::new(["store"]);
        let categories = QueryKey::new(["categories"]);
        cache.write(&store, "page".to_string());
        cache.write(&categories, "cats".to_string());
        cache.write(&key(), "item".to_string());
        let _a = cache.subscribe(&store);
        let _b = cache.subscribe(&key());

        let marks = cache.mark_stale(&KeyFilter::All, InvalidationCause::Reconnect);
        assert_eq!(marks.observed, vec![store.clone()]);
        assert!(cache.get(&categories).unwrap().is_fresh(Instant::now()));
        assert!(cache.get(&key()).unwrap().is_fresh(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn unobserved_entry_is_collected_after_gc_window() {
        let cache = cache(QueryConfig::default().with_gc_ms(1_000));
        let ticket = cache.subscribe(&key()).fetch.unwrap();
        cache.complete_fetch(&key(), ticket.request_id, Ok("v".to_string()));

        cache.unsubscribe(&key());
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(cache.get(&key()).is_some());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(cache.get(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribe_cancels_pending_collection() {
        let cache = cache(QueryConfig::default().with_gc_ms(1_000));
        let ticket = cache.subscribe(&key()).fetch.unwrap();
        cache.complete_fetch(&key(), ticket.request_id, Ok("v".to_string()));

        cache.unsubscribe(&key());
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _outcome = cache.subscribe(&key());
        tokio::time::sleep(Duration::from_millis(2_000)).await;

        assert!(cache.get(&key()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn collection_waits_for_in_flight_fetch() {
        let cache = cache(QueryConfig::default().with_gc_ms(100));
        let ticket = cache.subscribe(&key()).fetch.unwrap();
        cache.unsubscribe(&key());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get(&key()).is_some());

        // result still applied with nobody watching, then collected
        assert!(cache.complete_fetch(&key(), ticket.request_id, Ok("late".to_string())));
        assert_eq!(
            cache.get(&key()).unwrap().data.as_deref().map(String::as_str),
            Some("late")
        );
        tokio::time::sleep(Duration::from_millis(101)).await;
        assert!(cache.get(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_is_not_notified_of_its_own_subscribe() {
        let cache = cache(QueryConfig::default());
        let mut rx = cache.subscribe(&key()).receiver;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(rx.borrow().status, QueryStatus::Loading);

        let id = cache.get(&key()).unwrap().request_id.unwrap();
        cache.complete_fetch(&key(), id, Ok("v".to_string()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, QueryStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_notify_subscribers_synchronously() {
        let cache = cache(QueryConfig::default().with_stale_ms(10_000));
        cache.write(&key(), "first".to_string());
        let mut rx = cache.subscribe(&key()).receiver;

        cache.write(&key(), "second".to_string());
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.data.as_deref().map(String::as_str), Some("second"));

        cache.write_error(&key(), SyncError::network("reset"));
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(state.data.as_deref().map(String::as_str), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_closes_subscriber_channels() {
        let cache = cache(QueryConfig::default());
        let mut rx = cache.subscribe(&key()).receiver;
        assert!(cache.remove(&key()));
        assert!(rx.changed().await.is_err());
        assert!(!cache.remove(&key()));
    }
}
