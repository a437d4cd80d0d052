use async_trait::async_trait;
use std::sync::Arc;

use super::api::CatalogApi;
use super::keys::CatalogQuery;
use super::model::Resource;
use crate::error::SyncError;
use crate::key::QueryKey;
use crate::source::DataSource;

/// Resolves catalog query keys against a [`CatalogApi`].
pub struct CatalogSource {
    api: Arc<dyn CatalogApi>,
}

impl CatalogSource {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        CatalogSource { api }
    }

    pub fn api(&self) -> &Arc<dyn CatalogApi> {
        &self.api
    }
}

#[async_trait]
impl DataSource<Resource> for CatalogSource {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn fetch(&self, key: &QueryKey) -> Result<Resource, SyncError> {
        let resource = match CatalogQuery::parse(key)? {
            CatalogQuery::Store => Resource::Store(self.api.store_page().await?),
            CatalogQuery::Item(id) => Resource::Item(self.api.item(&id).await?),
            CatalogQuery::Categories => Resource::Categories(self.api.categories().await?),
            CatalogQuery::ItemsByCategory(category) => {
                Resource::ItemsByCategory(self.api.items_by_category(&category).await?)
            }
            CatalogQuery::Health => Resource::Health(self.api.health().await?),
        };
        Ok(resource)
    }
}
