//! Catalog entities as exchanged with the remote API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A listed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub condition: String,
    pub seller_id: String,
    pub seller_name: String,
    /// Image URLs, in display order.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Distance from the viewer, in miles.
    #[serde(default)]
    pub distance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload of the catalog landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePage {
    #[serde(default = "default_success")]
    pub success: bool,
    pub items: Vec<Item>,
    #[serde(rename = "total_items")]
    pub total: usize,
    /// Category names, first occurrence wins.
    #[serde(deserialize_with = "unique_categories")]
    pub categories: Vec<String>,
}

impl StorePage {
    pub fn new(items: Vec<Item>, categories: impl IntoIterator<Item = String>) -> Self {
        StorePage {
            success: true,
            total: items.len(),
            items,
            categories: dedup(categories),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoriesResponse {
    #[serde(deserialize_with = "unique_categories")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsByCategoryResponse {
    pub items: Vec<Item>,
    pub total: usize,
}

/// Body of the view-tracking write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemViewRequest {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Payload of `["item", id]` and result of tracking a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemViewResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
}

/// Any payload the catalog caches, one variant per resource kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Store(StorePage),
    Item(ItemViewResponse),
    Categories(CategoriesResponse),
    ItemsByCategory(ItemsByCategoryResponse),
    Health(HealthResponse),
}

impl Resource {
    pub fn as_store(&self) -> Option<&StorePage> {
        match self {
            Resource::Store(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&ItemViewResponse> {
        match self {
            Resource::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_categories(&self) -> Option<&CategoriesResponse> {
        match self {
            Resource::Categories(categories) => Some(categories),
            _ => None,
        }
    }

    pub fn as_items_by_category(&self) -> Option<&ItemsByCategoryResponse> {
        match self {
            Resource::ItemsByCategory(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_health(&self) -> Option<&HealthResponse> {
        match self {
            Resource::Health(health) => Some(health),
            _ => None,
        }
    }
}

fn default_success() -> bool {
    true
}

fn dedup(categories: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    categories
        .into_iter()
        .filter(|category| seen.insert(category.clone()))
        .collect()
}

fn unique_categories<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer).map(dedup)
}
