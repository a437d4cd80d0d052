use async_trait::async_trait;

use super::model::{
    CategoriesResponse, HealthResponse, ItemViewRequest, ItemViewResponse,
    ItemsByCategoryResponse, ResetResponse, StorePage,
};
use crate::error::SyncError;

/// The catalog's remote API, one method per endpoint.
///
/// Implemented by [`HttpCatalogApi`](super::HttpCatalogApi) over an injected
/// transport and by [`MemoryCatalog`](super::MemoryCatalog) for tests.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn store_page(&self) -> Result<StorePage, SyncError>;

    async fn item(&self, id: &str) -> Result<ItemViewResponse, SyncError>;

    async fn categories(&self) -> Result<CategoriesResponse, SyncError>;

    async fn items_by_category(&self, category: &str) -> Result<ItemsByCategoryResponse, SyncError>;

    async fn health(&self) -> Result<HealthResponse, SyncError>;

    /// Record that an item was viewed.
    async fn track_item_view(&self, request: &ItemViewRequest) -> Result<ItemViewResponse, SyncError>;

    /// Reset server-side state.
    async fn reset(&self) -> Result<ResetResponse, SyncError>;
}
