//! Walk through a browsing session against the in-memory catalog.
//!
//! Shows coalesced loads, view tracking that revalidates the open item, a
//! focus-driven refresh, and a flaky network being retried.
//!
//! Run with `RUST_LOG=catalog_sync=debug cargo run --example catalog_browse`
//! to see the cache transitions.

use catalog_sync::catalog::{CatalogClient, MemoryCatalog, keys};
use catalog_sync::{QueryStatus, SyncError};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalog_sync=info")),
        )
        .init();

    let catalog = Arc::new(MemoryCatalog::seeded().with_latency(Duration::from_millis(80)));
    let client = CatalogClient::new(catalog.clone());

    // Two views open the landing page at once: one request goes out
    let mut header = client.store();
    let mut grid = client.store();
    let page = grid.settled().await?;
    header.settled().await?;
    if let Some(page) = page.data.as_deref().and_then(|data| data.as_store()) {
        println!(
            "Store: {} items in {:?} ({} request)",
            page.total,
            page.categories,
            catalog.calls("store_page")
        );
    }

    // The landing page also needs the category list
    let loaded = client.queries().fetch_many([keys::categories()]).await;
    for categories in loaded.into_iter().flatten() {
        if let Some(categories) = categories.as_categories() {
            println!("Categories: {:?}", categories.categories);
        }
    }

    // Open an item and record the view
    let mut detail = client.item("item_1").ok_or("blank item id")?;
    detail.settled().await?;
    let outcome = client.track_item_view("item_1", Some("demo-user")).await?;
    println!(
        "{}; revalidating {:?}",
        outcome.output.message, outcome.invalidations[0].refetched
    );
    let state = detail.changed().await?;
    println!("Item detail while revalidating: {:?}, data kept: {}", state.status, state.data.is_some());
    let state = detail.settled().await?;
    if let Some(response) = state.data.as_deref().and_then(|data| data.as_item()) {
        println!("Item detail now: {}", response.message);
    }

    // The window regains focus: observed, opted-in queries revalidate
    let report = client.window_focused();
    println!("Focus refetched {:?}", report.refetched);
    grid.settled().await?;

    // A flaky network: two failures are absorbed by retries
    catalog.fail_next(2, SyncError::network("connection reset"));
    let mut textbooks = client.items_by_category("Textbooks").ok_or("blank category")?;
    let state = textbooks.settled().await?;
    match state.status {
        QueryStatus::Success => println!(
            "Textbooks loaded after {} calls",
            catalog.calls("items_by_category")
        ),
        status => println!("Textbooks ended as {:?}: {:?}", status, state.error),
    }

    client.shutdown();
    Ok(())
}
