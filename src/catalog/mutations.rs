//! Catalog writes and the queries they make stale.

use async_trait::async_trait;
use std::sync::Arc;

use super::api::CatalogApi;
use super::keys;
use super::model::{ItemViewRequest, ItemViewResponse, ResetResponse};
use crate::error::SyncError;
use crate::key::KeyFilter;
use crate::mutation::Mutation;

/// Records an item view. Invalidates `["item", id]`.
pub struct TrackItemView {
    api: Arc<dyn CatalogApi>,
}

impl TrackItemView {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        TrackItemView { api }
    }
}

#[async_trait]
impl Mutation for TrackItemView {
    type Input = ItemViewRequest;
    type Output = ItemViewResponse;

    fn name(&self) -> &'static str {
        "track_item_view"
    }

    async fn execute(&self, input: &ItemViewRequest) -> Result<ItemViewResponse, SyncError> {
        self.api.track_item_view(input).await
    }

    fn invalidates(&self, input: &ItemViewRequest) -> Vec<KeyFilter> {
        vec![KeyFilter::Exact(keys::item(&input.item_id))]
    }
}

/// Resets server-side data. Invalidates every query.
pub struct ResetData {
    api: Arc<dyn CatalogApi>,
}

impl ResetData {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        ResetData { api }
    }
}

#[async_trait]
impl Mutation for ResetData {
    type Input = ();
    type Output = ResetResponse;

    fn name(&self) -> &'static str {
        "reset_data"
    }

    async fn execute(&self, _input: &()) -> Result<ResetResponse, SyncError> {
        self.api.reset().await
    }

    fn invalidates(&self, _input: &()) -> Vec<KeyFilter> {
        vec![KeyFilter::All]
    }
}
