use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::config::QueryConfig;
use crate::error::SyncError;
use crate::key::QueryKey;
use crate::policy;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Created, no fetch started yet.
    Idle,
    /// A fetch is outstanding. Previous data, if any, is still served.
    Loading,
    /// The last fetch succeeded.
    Success,
    /// The last fetch failed after exhausting its retries.
    Error,
}

/// Generation number of a fetch for one key.
///
/// Only the result of the request whose id matches the entry's current
/// in-flight id is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time view of a cache entry, as delivered to subscribers.
pub struct QueryState<V> {
    pub key: QueryKey,
    /// Last successfully fetched payload.
    pub data: Option<Arc<V>>,
    pub status: QueryStatus,
    /// When the data was last fetched or written.
    pub fetched_at: Option<Instant>,
    /// Before this instant the data is fresh.
    pub stale_at: Option<Instant>,
    /// Last error, cleared by the next success.
    pub error: Option<SyncError>,
    pub observer_count: usize,
    /// Failed attempts of the current (or last) fetch.
    pub failure_count: u32,
    /// Id of the outstanding fetch, if any.
    pub request_id: Option<RequestId>,
}

impl<V> Clone for QueryState<V> {
    fn clone(&self) -> Self {
        QueryState {
            key: self.key.clone(),
            data: self.data.clone(),
            status: self.status,
            fetched_at: self.fetched_at,
            stale_at: self.stale_at,
            error: self.error.clone(),
            observer_count: self.observer_count,
            failure_count: self.failure_count,
            request_id: self.request_id,
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for QueryState<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("key", &self.key)
            .field("data", &self.data)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("observer_count", &self.observer_count)
            .field("failure_count", &self.failure_count)
            .field("request_id", &self.request_id)
            .finish()
    }
}

impl<V> QueryState<V> {
    /// Check if the data may be served without a refetch.
    pub fn is_fresh(&self, now: Instant) -> bool {
        policy::is_fresh(self.data.is_some(), self.stale_at, now)
    }

    /// A fetch is outstanding for this key.
    pub fn is_fetching(&self) -> bool {
        self.request_id.is_some()
    }

    /// The entry reached `Success` or `Error`.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, QueryStatus::Success | QueryStatus::Error)
    }
}

/// The in-flight fetch of an entry.
pub(crate) struct InFlight {
    pub id: RequestId,
    /// Set once the coordinator has spawned the task.
    pub task: Option<AbortHandle>,
}

/// One cache entry. Owned exclusively by [`QueryCache`](crate::cache::QueryCache).
pub(crate) struct CacheEntry<V> {
    pub key: QueryKey,
    pub config: QueryConfig,
    pub data: Option<Arc<V>>,
    pub status: QueryStatus,
    pub fetched_at: Option<Instant>,
    pub stale_at: Option<Instant>,
    pub error: Option<SyncError>,
    pub observer_count: usize,
    pub failure_count: u32,
    pub in_flight: Option<InFlight>,
    /// Bumped whenever a pending garbage collection must be cancelled.
    pub gc_epoch: u64,
    notifier: watch::Sender<QueryState<V>>,
}

impl<V> CacheEntry<V> {
    pub fn new(key: QueryKey, config: QueryConfig) -> Self {
        let initial = QueryState {
            key: key.clone(),
            data: None,
            status: QueryStatus::Idle,
            fetched_at: None,
            stale_at: None,
            error: None,
            observer_count: 0,
            failure_count: 0,
            request_id: None,
        };
        let (notifier, _) = watch::channel(initial);
        CacheEntry {
            key,
            config,
            data: None,
            status: QueryStatus::Idle,
            fetched_at: None,
            stale_at: None,
            error: None,
            observer_count: 0,
            failure_count: 0,
            in_flight: None,
            gc_epoch: 0,
            notifier,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        policy::is_fresh(self.data.is_some(), self.stale_at, now)
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|f| f.id)
    }

    pub fn snapshot(&self) -> QueryState<V> {
        QueryState {
            key: self.key.clone(),
            data: self.data.clone(),
            status: self.status,
            fetched_at: self.fetched_at,
            stale_at: self.stale_at,
            error: self.error.clone(),
            observer_count: self.observer_count,
            failure_count: self.failure_count,
            request_id: self.request_id(),
        }
    }

    /// Store a successful payload.
    pub fn set_data(&mut self, data: Arc<V>, now: Instant) {
        self.data = Some(data);
        self.status = QueryStatus::Success;
        self.fetched_at = Some(now);
        self.stale_at = Some(now + self.config.stale_window());
        self.error = None;
        self.failure_count = 0;
    }

    /// Record a terminal failure. Previous data is kept.
    pub fn set_error(&mut self, error: SyncError) {
        self.status = QueryStatus::Error;
        self.error = Some(error);
    }

    /// Abort the outstanding fetch task, if any, and forget it.
    pub fn cancel_in_flight(&mut self) -> Option<RequestId> {
        let in_flight = self.in_flight.take()?;
        if let Some(task) = in_flight.task {
            task.abort();
        }
        Some(in_flight.id)
    }

    /// Hand a new subscriber its receiver. The current state counts as seen.
    pub fn receiver(&self) -> watch::Receiver<QueryState<V>> {
        self.notifier.subscribe()
    }

    /// Push the current state to subscribers.
    pub fn notify(&self) {
        self.notifier.send_replace(self.snapshot());
    }

    /// Refresh the state held by the channel without waking subscribers.
    pub fn publish_quietly(&self) {
        let snapshot = self.snapshot();
        self.notifier.send_if_modified(move |state| {
            *state = snapshot;
            false
        });
    }
}

impl<V> Drop for CacheEntry<V> {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}
