//! catalog-sync - client-side data synchronization for a catalog browsing API
//!
//! This library provides the query layer that sits between views and a
//! remote read API:
//! - Stale-while-revalidate reads keyed by structured query keys
//! - Coalescing of concurrent fetches for the same key
//! - Last-generation-wins application of responses
//! - Mutation-driven, prefix-aware invalidation
//! - Focus, reconnect and interval refetch triggers for observed keys
//! - Garbage collection of entries nobody observes
//!
//! # Example
//!
//! ```ignore
//! use catalog_sync::catalog::{self, CatalogClient, MemoryCatalog};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = CatalogClient::new(Arc::new(MemoryCatalog::seeded()));
//!
//!     // Views subscribe and get pushed every change
//!     let mut store = client.store();
//!     let page = store.settled().await.unwrap();
//!
//!     // A successful write invalidates the item it touched
//!     client.track_item_view("item_1", None).await.unwrap();
//! }
//! ```

mod cache;
mod client;
mod config;
mod entry;
mod error;
mod fetch;
mod invalidation;
mod key;
mod mutation;
mod policy;
mod source;
mod subscription;
mod utils;

pub mod catalog;

// Re-export public API
pub use cache::{FetchTicket, QueryCache};
pub use client::{QueryClient, QueryClientBuilder};
pub use config::{ClientConfig, MAX_RETRY_DELAY, QueryConfig};
pub use entry::{QueryState, QueryStatus, RequestId};
pub use error::SyncError;
pub use fetch::FetchCoordinator;
pub use invalidation::{InvalidationBus, InvalidationCause, InvalidationReport};
pub use key::{KeyFilter, QueryKey};
pub use mutation::{Mutation, MutationCoordinator, MutationOutcome};
pub use policy::{is_fresh, retry_delay, should_fetch};
pub use source::DataSource;
pub use subscription::{Subscription, SubscriptionManager};
