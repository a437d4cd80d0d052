use async_trait::async_trait;
use catalog_sync::{DataSource, QueryKey, SyncError};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Payload used by the benchmarks
#[derive(Clone, Debug, PartialEq)]
pub struct BenchItem {
    pub id: u64,
    pub title: String,
    pub price: f64,
}

impl BenchItem {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            title: format!("Item {}", id),
            price: (id % 500) as f64 + 0.99,
        }
    }
}

/// Simulated remote API with configurable latency
#[derive(Clone)]
pub struct FakeRemote {
    latency_ms: u64,
    fetch_count: Arc<AtomicUsize>,
}

impl FakeRemote {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[allow(dead_code)]
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DataSource<BenchItem> for FakeRemote {
    fn name(&self) -> &'static str {
        "fake_remote"
    }

    async fn fetch(&self, key: &QueryKey) -> Result<BenchItem, SyncError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        // Simulate network latency
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }

        let id = key
            .params()
            .first()
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| SyncError::not_found(key.to_string()))?;
        Ok(BenchItem::new(id))
    }
}

/// Generate query keys for different workload patterns
pub struct KeyGenerator {
    num_keys: usize,
}

impl KeyGenerator {
    pub fn new(num_keys: usize) -> Self {
        Self { num_keys }
    }

    /// Every key once, in order
    pub fn sequential(&self) -> Vec<QueryKey> {
        (0..self.num_keys).map(key).collect()
    }

    /// Simplified Zipf: 80% of requests go to 20% of keys
    pub fn zipf_random(&self, count: usize) -> Vec<QueryKey> {
        let mut rng = rand::thread_rng();
        let hot = (self.num_keys / 5).max(1);

        (0..count)
            .map(|_| {
                let id = if rng.gen_bool(0.8) {
                    rng.gen_range(0..hot)
                } else {
                    rng.gen_range(0..self.num_keys)
                };
                key(id)
            })
            .collect()
    }
}

fn key(id: usize) -> QueryKey {
    QueryKey::for_resource("item", [id.to_string()])
}
