use std::sync::Arc;

use super::api::CatalogApi;
use super::config::default_config;
use super::keys;
use super::model::{ItemViewRequest, ItemViewResponse, ResetResponse, Resource};
use super::mutations::{ResetData, TrackItemView};
use super::source::CatalogSource;
use crate::client::QueryClient;
use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::invalidation::InvalidationReport;
use crate::key::KeyFilter;
use crate::mutation::MutationOutcome;
use crate::subscription::Subscription;

/// Catalog-specific front of a [`QueryClient`].
///
/// One method per read the views make, plus the catalog's writes. Cheap to
/// clone; clones share the cache.
#[derive(Clone)]
pub struct CatalogClient {
    queries: QueryClient<Resource>,
    track_view: Arc<TrackItemView>,
    reset: Arc<ResetData>,
}

impl CatalogClient {
    /// Client with [`default_config`].
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        Self::with_config(api, default_config())
    }

    pub fn with_config(api: Arc<dyn CatalogApi>, config: ClientConfig) -> Self {
        let queries = QueryClient::<Resource>::builder(Arc::new(CatalogSource::new(api.clone())))
            .config(config)
            .build();
        CatalogClient {
            queries,
            track_view: Arc::new(TrackItemView::new(api.clone())),
            reset: Arc::new(ResetData::new(api)),
        }
    }

    /// The generic client underneath, for invalidation and raw key access.
    pub fn queries(&self) -> &QueryClient<Resource> {
        &self.queries
    }

    pub fn store(&self) -> Subscription<Resource> {
        self.queries.subscribe(keys::store())
    }

    /// Observe one item. A blank id is a disabled query and yields `None`.
    pub fn item(&self, id: &str) -> Option<Subscription<Resource>> {
        (!id.trim().is_empty()).then(|| self.queries.subscribe(keys::item(id)))
    }

    pub fn categories(&self) -> Subscription<Resource> {
        self.queries.subscribe(keys::categories())
    }

    /// Observe one category listing. A blank name yields `None`.
    pub fn items_by_category(&self, category: &str) -> Option<Subscription<Resource>> {
        (!category.trim().is_empty())
            .then(|| self.queries.subscribe(keys::items_by_category(category)))
    }

    pub fn health(&self) -> Subscription<Resource> {
        self.queries.subscribe(keys::health())
    }

    /// Record a view of `item_id`; the item's query is invalidated on success.
    pub async fn track_item_view(
        &self,
        item_id: &str,
        user_id: Option<&str>,
    ) -> Result<MutationOutcome<ItemViewResponse>, SyncError> {
        let request = ItemViewRequest {
            item_id: item_id.to_string(),
            user_id: user_id.map(str::to_string),
        };
        self.queries.mutate(self.track_view.as_ref(), request).await
    }

    /// Reset server data; every query is invalidated on success.
    pub async fn reset_data(&self) -> Result<MutationOutcome<ResetResponse>, SyncError> {
        self.queries.mutate(self.reset.as_ref(), ()).await
    }

    /// The "refresh" action: revalidate the landing page and its categories.
    pub fn refresh_store(&self) -> Vec<InvalidationReport> {
        [keys::store(), keys::categories()]
            .into_iter()
            .map(|key| self.queries.invalidate(&KeyFilter::Exact(key)))
            .collect()
    }

    pub fn window_focused(&self) -> InvalidationReport {
        self.queries.window_focused()
    }

    pub fn network_reconnected(&self) -> InvalidationReport {
        self.queries.network_reconnected()
    }

    /// Tear down: stop polling, abort fetches, drop the cache.
    pub fn shutdown(&self) {
        self.queries.clear();
    }
}
