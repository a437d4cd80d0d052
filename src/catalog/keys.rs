//! Query keys for catalog resources.
//!
//! All keys are built here so that equal resources always get equal keys.

use crate::error::SyncError;
use crate::key::QueryKey;

pub const STORE: &str = "store";
pub const ITEM: &str = "item";
pub const CATEGORIES: &str = "categories";
pub const ITEMS: &str = "items";
pub const HEALTH: &str = "health";

const CATEGORY: &str = "category";

pub fn store() -> QueryKey {
    QueryKey::new([STORE])
}

pub fn item(id: &str) -> QueryKey {
    QueryKey::for_resource(ITEM, [id])
}

pub fn categories() -> QueryKey {
    QueryKey::new([CATEGORIES])
}

pub fn items_by_category(category: &str) -> QueryKey {
    QueryKey::for_resource(ITEMS, [CATEGORY, category])
}

/// Prefix covering every per-category listing.
pub fn all_items() -> QueryKey {
    QueryKey::new([ITEMS])
}

pub fn health() -> QueryKey {
    QueryKey::new([HEALTH])
}

/// A catalog read, recovered from its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    Store,
    Item(String),
    Categories,
    ItemsByCategory(String),
    Health,
}

impl CatalogQuery {
    /// Parse `key` into the read it names.
    pub fn parse(key: &QueryKey) -> Result<Self, SyncError> {
        let segments: Vec<&str> = key.segments().iter().map(String::as_str).collect();
        match segments.as_slice() {
            [STORE] => Ok(CatalogQuery::Store),
            [ITEM, id] if !id.is_empty() => Ok(CatalogQuery::Item(id.to_string())),
            [CATEGORIES] => Ok(CatalogQuery::Categories),
            [ITEMS, CATEGORY, name] if !name.is_empty() => {
                Ok(CatalogQuery::ItemsByCategory(name.to_string()))
            }
            [HEALTH] => Ok(CatalogQuery::Health),
            _ => Err(SyncError::validation(format!("unknown catalog key {}", key))),
        }
    }

    pub fn key(&self) -> QueryKey {
        match self {
            CatalogQuery::Store => store(),
            CatalogQuery::Item(id) => item(id),
            CatalogQuery::Categories => categories(),
            CatalogQuery::ItemsByCategory(name) => items_by_category(name),
            CatalogQuery::Health => health(),
        }
    }
}
