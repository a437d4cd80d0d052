//! Fetch coordination.
//!
//! The cache decides *whether* a fetch starts and mints its request id; the
//! coordinator runs it. Each fetch is one background task that calls the data
//! source, retries transport failures with backoff, and hands the outcome back
//! to the cache, which applies it only if the request is still current.

use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::cache::{FetchTicket, QueryCache};
use crate::error::SyncError;
use crate::key::QueryKey;
use crate::policy::retry_delay;
use crate::source::DataSource;
use crate::utils::spawn;

/// Runs fetches against a [`DataSource`] on behalf of a [`QueryCache`].
pub struct FetchCoordinator<V> {
    cache: Arc<QueryCache<V>>,
    source: Arc<dyn DataSource<V>>,
}

impl<V> Clone for FetchCoordinator<V> {
    fn clone(&self) -> Self {
        FetchCoordinator {
            cache: Arc::clone(&self.cache),
            source: Arc::clone(&self.source),
        }
    }
}

impl<V> FetchCoordinator<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(cache: Arc<QueryCache<V>>, source: Arc<dyn DataSource<V>>) -> Self {
        FetchCoordinator { cache, source }
    }

    pub fn cache(&self) -> &Arc<QueryCache<V>> {
        &self.cache
    }

    pub fn source(&self) -> &Arc<dyn DataSource<V>> {
        &self.source
    }

    /// Run the fetch described by `ticket` in the background.
    pub(crate) fn start(&self, ticket: FetchTicket) {
        let key = ticket.key.clone();
        let request_id = ticket.request_id;
        debug!(
            key = %key,
            request_id = %request_id,
            source = self.source.name(),
            "fetch started"
        );

        let task = run_fetch(
            Arc::downgrade(&self.cache),
            Arc::clone(&self.source),
            ticket,
        );
        match spawn("fetch", task) {
            Some(handle) => self.cache.attach_task(&key, request_id, handle),
            None => {
                self.cache.complete_fetch(&key, request_id, Err(SyncError::Closed));
            }
        }
    }

    /// Start a fetch for an existing entry.
    ///
    /// With `supersede` an outstanding fetch is replaced; otherwise it is
    /// joined. Returns whether a new fetch was started.
    pub fn refetch(&self, key: &QueryKey, supersede: bool) -> bool {
        match self.cache.begin_fetch(key, supersede) {
            Some(ticket) => {
                self.start(ticket);
                true
            }
            None => false,
        }
    }
}

async fn run_fetch<V>(cache: Weak<QueryCache<V>>, source: Arc<dyn DataSource<V>>, ticket: FetchTicket)
where
    V: Send + Sync + 'static,
{
    let FetchTicket {
        key,
        request_id,
        config,
    } = ticket;
    let mut attempt = 0;

    loop {
        let result = source.fetch(&key).await;
        let Some(cache) = cache.upgrade() else {
            return;
        };

        match result {
            Err(error) if error.is_retryable() && attempt < config.retry => {
                attempt += 1;
                let delay = retry_delay(&config, attempt);
                warn!(
                    key = %key,
                    request_id = %request_id,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %error,
                    "fetch attempt failed"
                );
                if !cache.record_failure(&key, request_id, attempt) {
                    return;
                }
                drop(cache);
                tokio::time::sleep(delay).await;
            }
            result => {
                if let Err(error) = &result {
                    warn!(key = %key, request_id = %request_id, error = %error, "fetch failed");
                }
                cache.complete_fetch(&key, request_id, result);
                return;
            }
        }
    }
}
