use async_trait::async_trait;

use crate::error::SyncError;
use crate::key::QueryKey;

/// The remote side of the cache: resolves a query key to a fresh payload.
///
/// The resource kind is `key.kind()` and its parameters are `key.params()`.
/// Implementations perform the network call and report failures through the
/// [`SyncError`] taxonomy; only [`SyncError::Network`] is retried.
#[async_trait]
pub trait DataSource<V>: Send + Sync {
    /// A name for tracing.
    ///
    /// # Example
    /// - "catalog"
    /// - "memory"
    fn name(&self) -> &'static str;

    /// Fetch the current value of the resource named by `key`.
    async fn fetch(&self, key: &QueryKey) -> Result<V, SyncError>;
}
