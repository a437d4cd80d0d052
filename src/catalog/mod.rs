//! The catalog binding: entities, keys and endpoints of the catalog API, and
//! a [`CatalogClient`] that serves them through the query cache.

mod api;
mod client;
mod config;
mod http;
pub mod keys;
mod memory;
mod model;
mod mutations;
mod source;

pub use api::CatalogApi;
pub use client::CatalogClient;
pub use config::default_config;
pub use http::{ApiRequest, ApiResponse, DEFAULT_BASE_URL, HttpCatalogApi, Method, Transport};
pub use keys::CatalogQuery;
pub use memory::MemoryCatalog;
pub use model::{
    CategoriesResponse, HealthResponse, Item, ItemViewRequest, ItemViewResponse,
    ItemsByCategoryResponse, ResetResponse, Resource, StorePage,
};
pub use mutations::{ResetData, TrackItemView};
pub use source::CatalogSource;
