//! Query client facade.
//!
//! `QueryClient` wires one [`QueryCache`] to a [`DataSource`] and exposes the
//! operations views use: subscribe, mutate, invalidate and the environment
//! triggers. A client is created explicitly and passed around by clone; there
//! is no process-wide instance.

use futures::future::join_all;
use std::sync::Arc;

use crate::cache::QueryCache;
use crate::config::{ClientConfig, QueryConfig};
use crate::entry::QueryState;
use crate::error::SyncError;
use crate::fetch::FetchCoordinator;
use crate::invalidation::{InvalidationBus, InvalidationReport};
use crate::key::{KeyFilter, QueryKey};
use crate::mutation::{Mutation, MutationCoordinator, MutationOutcome};
use crate::source::DataSource;
use crate::subscription::{Subscription, SubscriptionManager};

/// Builder for a [`QueryClient`].
///
/// # Example
///
/// ```ignore
/// let client = QueryClientBuilder::new(Arc::new(MySource))
///     .defaults(QueryConfig::default().with_gc_ms(60_000))
///     .kind("store", QueryConfig::default().with_stale_ms(30_000))
///     .build();
///
/// let mut store = client.subscribe(["store"]);
/// let state = store.settled().await?;
/// ```
pub struct QueryClientBuilder<V> {
    source: Arc<dyn DataSource<V>>,
    config: ClientConfig,
}

impl<V> QueryClientBuilder<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn DataSource<V>>) -> Self {
        QueryClientBuilder {
            source,
            config: ClientConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the record used for kinds without an override.
    pub fn defaults(mut self, defaults: QueryConfig) -> Self {
        self.config.defaults = defaults;
        self
    }

    /// Override the record for one resource kind.
    pub fn kind(mut self, kind: &str, config: QueryConfig) -> Self {
        self.config.kinds.insert(kind.to_string(), config);
        self
    }

    pub fn build(self) -> QueryClient<V> {
        let cache = Arc::new(QueryCache::new(self.config));
        let fetcher = FetchCoordinator::new(cache.clone(), self.source);
        let bus = InvalidationBus::new(fetcher.clone());
        QueryClient {
            cache,
            mutations: MutationCoordinator::new(bus.clone()),
            subscriptions: Arc::new(SubscriptionManager::new(fetcher)),
            bus,
        }
    }
}

/// Handle to a query cache and its coordinators. Cheap to clone.
pub struct QueryClient<V> {
    cache: Arc<QueryCache<V>>,
    bus: InvalidationBus<V>,
    mutations: MutationCoordinator<V>,
    subscriptions: Arc<SubscriptionManager<V>>,
}

impl<V> Clone for QueryClient<V> {
    fn clone(&self) -> Self {
        QueryClient {
            cache: Arc::clone(&self.cache),
            bus: self.bus.clone(),
            mutations: self.mutations.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
        }
    }
}

impl<V> QueryClient<V>
where
    V: Send + Sync + 'static,
{
    /// Create a client with the default configuration.
    pub fn new(source: Arc<dyn DataSource<V>>) -> Self {
        QueryClientBuilder::new(source).build()
    }

    pub fn builder(source: Arc<dyn DataSource<V>>) -> QueryClientBuilder<V> {
        QueryClientBuilder::new(source)
    }

    pub fn config(&self) -> &ClientConfig {
        self.cache.config()
    }

    /// Observe `key`. A fetch starts if the entry is missing or stale and no
    /// fetch is already outstanding.
    pub fn subscribe(&self, key: impl Into<QueryKey>) -> Subscription<V> {
        self.subscriptions.observe(key.into())
    }

    /// Current state of `key`, if cached. Never fetches.
    pub fn get(&self, key: &QueryKey) -> Option<QueryState<V>> {
        self.cache.get(key)
    }

    /// Resolve `key` once: serve fresh data from the cache, or wait for the
    /// fetch to settle.
    ///
    /// When the fetch fails but earlier data exists, that data is returned.
    pub async fn fetch(&self, key: impl Into<QueryKey>) -> Result<Arc<V>, SyncError> {
        let mut subscription = self.subscribe(key);
        let state = subscription.settled().await?;
        match (state.data, state.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(SyncError::Closed),
        }
    }

    /// Resolve several keys concurrently. Results come back in input order.
    pub async fn fetch_many<I, K>(&self, keys: I) -> Vec<Result<Arc<V>, SyncError>>
    where
        I: IntoIterator<Item = K>,
        K: Into<QueryKey>,
    {
        join_all(keys.into_iter().map(|key| self.fetch(key))).await
    }

    /// Write `data` for `key` as if it had just been fetched.
    pub fn set_query_data(&self, key: impl Into<QueryKey>, data: V) {
        self.cache.write(&key.into(), data);
    }

    /// Mark matching entries stale and revalidate the observed ones.
    pub fn invalidate(&self, filter: &KeyFilter) -> InvalidationReport {
        self.bus.invalidate(filter)
    }

    /// User-triggered refresh of one key.
    pub fn refetch(&self, key: impl Into<QueryKey>) -> InvalidationReport {
        self.bus.invalidate(&KeyFilter::Exact(key.into()))
    }

    /// Run a mutation and, on success, invalidate what it declares.
    pub async fn mutate<M>(
        &self,
        mutation: &M,
        input: M::Input,
    ) -> Result<MutationOutcome<M::Output>, SyncError>
    where
        M: Mutation + ?Sized,
    {
        self.mutations.mutate(mutation, input).await
    }

    pub fn window_focused(&self) -> InvalidationReport {
        self.subscriptions.window_focused()
    }

    pub fn network_reconnected(&self) -> InvalidationReport {
        self.subscriptions.network_reconnected()
    }

    /// Drop one entry, aborting its fetch.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.cache.remove(key)
    }

    /// Tear down: stop pollers, abort fetches and drop every entry.
    pub fn clear(&self) {
        self.subscriptions.stop_polling();
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.cache.keys()
    }
}
