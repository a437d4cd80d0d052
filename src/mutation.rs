//! Mutation coordination.
//!
//! A mutation is a remote write plus the statically known set of queries it
//! makes stale. Invalidation happens only after the write succeeded; a failed
//! write leaves the cache untouched and is never retried.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::invalidation::{InvalidationBus, InvalidationReport};
use crate::key::KeyFilter;

/// A remote write and its dependent queries.
///
/// # Example
/// ```ignore
/// struct RenameUser { api: Arc<Api> }
///
/// #[async_trait]
/// impl Mutation for RenameUser {
///     type Input = (String, String);
///     type Output = ();
///
///     fn name(&self) -> &'static str { "rename_user" }
///
///     async fn execute(&self, (id, name): &Self::Input) -> Result<(), SyncError> {
///         self.api.rename(id, name).await
///     }
///
///     fn invalidates(&self, (id, _): &Self::Input) -> Vec<KeyFilter> {
///         vec![KeyFilter::exact(["user", id.as_str()])]
///     }
/// }
/// ```
#[async_trait]
pub trait Mutation: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    /// A name for tracing.
    fn name(&self) -> &'static str;

    /// Perform the write against the remote side.
    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, SyncError>;

    /// Queries made stale by a successful write with `input`.
    fn invalidates(&self, input: &Self::Input) -> Vec<KeyFilter>;
}

/// Result of a successful mutation.
#[derive(Debug, Clone)]
pub struct MutationOutcome<T> {
    pub output: T,
    /// One report per declared filter, in declaration order.
    pub invalidations: Vec<InvalidationReport>,
}

/// Executes mutations and cascades their invalidations.
pub struct MutationCoordinator<V> {
    bus: InvalidationBus<V>,
}

impl<V> Clone for MutationCoordinator<V> {
    fn clone(&self) -> Self {
        MutationCoordinator {
            bus: self.bus.clone(),
        }
    }
}

impl<V> MutationCoordinator<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(bus: InvalidationBus<V>) -> Self {
        MutationCoordinator { bus }
    }

    /// Run `mutation` with `input`.
    ///
    /// On success every declared filter is invalidated. On failure the error
    /// is returned as is and nothing is invalidated.
    pub async fn mutate<M>(
        &self,
        mutation: &M,
        input: M::Input,
    ) -> Result<MutationOutcome<M::Output>, SyncError>
    where
        M: Mutation + ?Sized,
    {
        let output = match mutation.execute(&input).await {
            Ok(output) => output,
            Err(error) => {
                warn!(mutation = mutation.name(), error = %error, "mutation failed");
                return Err(error);
            }
        };

        let filters = mutation.invalidates(&input);
        debug!(
            mutation = mutation.name(),
            filters = filters.len(),
            "mutation succeeded, invalidating dependents"
        );
        let invalidations = filters
            .iter()
            .map(|filter| self.bus.invalidate(filter))
            .collect();

        Ok(MutationOutcome {
            output,
            invalidations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::config::{ClientConfig, QueryConfig};
    use crate::fetch::FetchCoordinator;
    use crate::key::QueryKey;
    use crate::source::DataSource;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    struct Static;

    #[async_trait]
    impl DataSource<String> for Static {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch(&self, key: &QueryKey) -> Result<String, SyncError> {
            Ok(key.to_string())
        }
    }

    /// Writes a like; succeeds unless the id is "bad".
    struct Like {
        writes: AtomicUsize,
    }

    #[async_trait]
    impl Mutation for Like {
        type Input = String;
        type Output = usize;

        fn name(&self) -> &'static str {
            "like"
        }

        async fn execute(&self, input: &String) -> Result<usize, SyncError> {
            if input == "bad" {
                return Err(SyncError::validation("unknown post"));
            }
            Ok(self.writes.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn invalidates(&self, input: &String) -> Vec<KeyFilter> {
            vec![
                KeyFilter::exact(["post", input.as_str()]),
                KeyFilter::prefix(["feed"]),
            ]
        }
    }

    fn setup() -> (MutationCoordinator<String>, Arc<QueryCache<String>>) {
        let config = ClientConfig::new(QueryConfig::default().with_stale_ms(60_000));
        let cache = Arc::new(QueryCache::new(config));
        let fetcher = FetchCoordinator::new(cache.clone(), Arc::new(Static));
        (MutationCoordinator::new(InvalidationBus::new(fetcher)), cache)
    }

    #[tokio::test(start_paused = true)]
    async fn success_invalidates_declared_keys() {
        let (mutations, cache) = setup();
        let post = QueryKey::new(["post", "7"]);
        let feed = QueryKey::new(["feed", "home"]);
        let other = QueryKey::new(["post", "8"]);
        for key in [&post, &feed, &other] {
            cache.write(key, "seed".to_string());
        }
        let like = Like {
            writes: AtomicUsize::new(0),
        };

        let outcome = mutations.mutate(&like, "7".to_string()).await.unwrap();
        assert_eq!(outcome.output, 1);
        assert_eq!(outcome.invalidations.len(), 2);
        assert_eq!(outcome.invalidations[0].matched, 1);
        assert_eq!(outcome.invalidations[1].matched, 1);

        let now = Instant::now();
        assert!(!cache.get(&post).unwrap().is_fresh(now));
        assert!(!cache.get(&feed).unwrap().is_fresh(now));
        assert!(cache.get(&other).unwrap().is_fresh(now));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_returns_error_without_invalidating() {
        let (mutations, cache) = setup();
        let feed = QueryKey::new(["feed", "home"]);
        cache.write(&feed, "seed".to_string());
        let like = Like {
            writes: AtomicUsize::new(0),
        };

        let err = mutations.mutate(&like, "bad".to_string()).await.unwrap_err();
        assert_eq!(err, SyncError::validation("unknown post"));
        assert!(cache.get(&feed).unwrap().is_fresh(Instant::now()));
        assert_eq!(like.writes.load(Ordering::SeqCst), 0);
    }
}
