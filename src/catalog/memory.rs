//! In-memory catalog API.
//!
//! Serves a small seeded catalog, counts calls per endpoint and can be told to
//! fail upcoming calls. Used by tests and the demo in place of a server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tracing::trace;

use super::api::CatalogApi;
use super::model::{
    CategoriesResponse, HealthResponse, Item, ItemViewRequest, ItemViewResponse,
    ItemsByCategoryResponse, ResetResponse, StorePage,
};
use crate::error::SyncError;
use crate::utils::lock;

struct CatalogState {
    items: Vec<Item>,
    views: HashMap<String, u64>,
}

impl CatalogState {
    fn seeded() -> Self {
        CatalogState {
            items: seed_items(),
            views: HashMap::new(),
        }
    }

    fn find(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    fn view_response(&self, id: &str) -> Option<ItemViewResponse> {
        let item = self.find(id)?.clone();
        let views = self.views.get(id).copied().unwrap_or(0);
        Some(ItemViewResponse {
            success: true,
            message: format!("{} views", views),
            item: Some(item),
        })
    }
}

/// [`CatalogApi`] backed by process memory.
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
    failures: Mutex<VecDeque<SyncError>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    latency: Duration,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::seeded()
    }
}

impl MemoryCatalog {
    /// A catalog holding the four seed items.
    pub fn seeded() -> Self {
        MemoryCatalog {
            state: Mutex::new(CatalogState::seeded()),
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `count` calls, whatever the endpoint, with `error`.
    pub fn fail_next(&self, count: usize, error: SyncError) {
        let mut failures = lock(&self.failures);
        failures.extend(std::iter::repeat_n(error, count));
    }

    /// Add or replace an item.
    pub fn upsert_item(&self, item: Item) {
        let mut state = lock(&self.state);
        match state.items.iter().position(|existing| existing.id == item.id) {
            Some(index) => state.items[index] = item,
            None => state.items.push(item),
        }
    }

    /// Calls made to `endpoint` so far, failed ones included.
    ///
    /// Endpoints are named after the [`CatalogApi`] methods.
    pub fn calls(&self, endpoint: &str) -> usize {
        lock(&self.calls).get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    pub fn views(&self, id: &str) -> u64 {
        lock(&self.state).views.get(id).copied().unwrap_or(0)
    }

    /// Count the call, consume an injected failure and wait out the latency.
    async fn enter(&self, endpoint: &'static str) -> Result<(), SyncError> {
        *lock(&self.calls).entry(endpoint).or_insert(0) += 1;
        let failure = lock(&self.failures).pop_front();
        trace!(endpoint, injected_failure = failure.is_some(), "memory catalog call");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogApi for MemoryCatalog {
    async fn store_page(&self) -> Result<StorePage, SyncError> {
        self.enter("store_page").await?;
        let state = lock(&self.state);
        let categories = state.items.iter().map(|item| item.category.clone());
        Ok(StorePage::new(state.items.clone(), categories))
    }

    async fn item(&self, id: &str) -> Result<ItemViewResponse, SyncError> {
        self.enter("item").await?;
        lock(&self.state)
            .view_response(id)
            .ok_or_else(|| SyncError::not_found(format!("item {}", id)))
    }

    async fn categories(&self) -> Result<CategoriesResponse, SyncError> {
        self.enter("categories").await?;
        let state = lock(&self.state);
        let categories: BTreeSet<String> =
            state.items.iter().map(|item| item.category.clone()).collect();
        Ok(CategoriesResponse {
            categories: categories.into_iter().collect(),
        })
    }

    async fn items_by_category(&self, category: &str) -> Result<ItemsByCategoryResponse, SyncError> {
        self.enter("items_by_category").await?;
        let state = lock(&self.state);
        let items: Vec<Item> = state
            .items
            .iter()
            .filter(|item| item.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect();
        Ok(ItemsByCategoryResponse {
            total: items.len(),
            items,
        })
    }

    async fn health(&self) -> Result<HealthResponse, SyncError> {
        self.enter("health").await?;
        Ok(HealthResponse {
            status: "healthy".to_string(),
            message: "Catalog API is running".to_string(),
        })
    }

    async fn track_item_view(&self, request: &ItemViewRequest) -> Result<ItemViewResponse, SyncError> {
        self.enter("track_item_view").await?;
        if request.item_id.trim().is_empty() {
            return Err(SyncError::validation("item_id must not be empty"));
        }
        let mut state = lock(&self.state);
        if state.find(&request.item_id).is_none() {
            return Err(SyncError::not_found(format!("item {}", request.item_id)));
        }
        *state.views.entry(request.item_id.clone()).or_insert(0) += 1;
        let mut response = state
            .view_response(&request.item_id)
            .ok_or_else(|| SyncError::not_found(format!("item {}", request.item_id)))?;
        response.message = "View tracked".to_string();
        Ok(response)
    }

    async fn reset(&self) -> Result<ResetResponse, SyncError> {
        self.enter("reset").await?;
        *lock(&self.state) = CatalogState::seeded();
        Ok(ResetResponse {
            message: "All data reset successfully".to_string(),
        })
    }
}

fn seed_items() -> Vec<Item> {
    // 2024-01-15T10:30:00Z
    let listed = DateTime::<Utc>::from_timestamp(1_705_314_600, 0).unwrap_or_default();
    let item = |id: &str, title: &str, price: f64, category: &str, condition: &str, tags: &[&str]| Item {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("{} in {} condition", title, condition.to_lowercase()),
        price,
        category: category.to_string(),
        condition: condition.to_string(),
        seller_id: format!("seller_{}", id.trim_start_matches("item_")),
        seller_name: "Campus Seller".to_string(),
        images: vec![format!("https://images.example/{}.jpg", id)],
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        distance: 0.5,
        created_at: listed,
        updated_at: listed,
    };

    vec![
        item("item_1", "MacBook Pro", 1200.0, "Electronics", "Like New", &["laptop", "apple"]),
        item("item_2", "Calculus Textbook", 45.0, "Textbooks", "Good", &["math", "textbook"]),
        item("item_3", "Coffee Maker", 25.0, "Appliances", "Good", &["kitchen", "coffee"]),
        item("item_4", "Bike Lock", 15.0, "Accessories", "New", &["bike", "security"]),
    ]
}
