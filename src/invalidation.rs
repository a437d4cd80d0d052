//! Invalidation bus.
//!
//! Marks matching entries stale and revalidates the observed ones right away.
//! Unobserved entries only get stale; they refetch on their next subscribe.
//! Data is never cleared here, so views keep the last good value until the
//! revalidation lands.

use tracing::debug;

use crate::config::QueryConfig;
use crate::fetch::FetchCoordinator;
use crate::key::{KeyFilter, QueryKey};

/// Why entries are being invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationCause {
    /// Explicit call, including mutation cascades and user "refresh".
    Manual,
    /// The window regained focus.
    WindowFocus,
    /// The network came back.
    Reconnect,
    /// A poll interval elapsed.
    Poll,
}

impl InvalidationCause {
    /// Environment triggers never touch entries nobody observes.
    pub(crate) fn observed_only(self) -> bool {
        !matches!(self, InvalidationCause::Manual)
    }

    /// Whether the entry's config opts into this trigger.
    pub(crate) fn applies_to(self, config: &QueryConfig) -> bool {
        match self {
            InvalidationCause::Manual => true,
            InvalidationCause::WindowFocus => config.refetch_on_regain_observer,
            InvalidationCause::Reconnect => config.refetch_on_reconnect,
            InvalidationCause::Poll => config.poll_interval().is_some(),
        }
    }

    /// Manual invalidation replaces an outstanding fetch; triggers join it.
    fn supersedes_in_flight(self) -> bool {
        matches!(self, InvalidationCause::Manual)
    }
}

/// What an invalidation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Entries marked stale.
    pub matched: usize,
    /// Observed entries a revalidation fetch was started for.
    pub refetched: Vec<QueryKey>,
}

/// Fans invalidations out to the cache and the fetch coordinator.
pub struct InvalidationBus<V> {
    fetcher: FetchCoordinator<V>,
}

impl<V> Clone for InvalidationBus<V> {
    fn clone(&self) -> Self {
        InvalidationBus {
            fetcher: self.fetcher.clone(),
        }
    }
}

impl<V> InvalidationBus<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(fetcher: FetchCoordinator<V>) -> Self {
        InvalidationBus { fetcher }
    }

    /// Invalidate every entry matching `filter`.
    pub fn invalidate(&self, filter: &KeyFilter) -> InvalidationReport {
        self.dispatch(filter, InvalidationCause::Manual)
    }

    pub(crate) fn dispatch(&self, filter: &KeyFilter, cause: InvalidationCause) -> InvalidationReport {
        let marks = self.fetcher.cache().mark_stale(filter, cause);
        let supersede = cause.supersedes_in_flight();

        let refetched: Vec<QueryKey> = marks
            .observed
            .into_iter()
            .filter(|key| self.fetcher.refetch(key, supersede))
            .collect();

        debug!(
            filter = %filter,
            cause = ?cause,
            matched = marks.matched,
            refetched = refetched.len(),
            "invalidation dispatched"
        );
        InvalidationReport {
            matched: marks.matched,
            refetched,
        }
    }
}
