use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use catalog_sync::{QueryClient, QueryConfig, QueryKey};
use tokio::runtime::Runtime;

mod common;
use common::{BenchConfig, BenchItem, FakeRemote, KeyGenerator};

/// Client whose entries stay fresh for the whole run
fn setup_fresh_client(remote: &FakeRemote) -> QueryClient<BenchItem> {
    QueryClient::<BenchItem>::builder(Arc::new(remote.clone()))
        .defaults(QueryConfig::default().with_stale_ms(3_600_000))
        .build()
}

/// Client that treats every entry as stale
fn setup_stale_client(remote: &FakeRemote) -> QueryClient<BenchItem> {
    QueryClient::<BenchItem>::builder(Arc::new(remote.clone()))
        .defaults(QueryConfig::default().with_stale_ms(0))
        .build()
}

fn populate(client: &QueryClient<BenchItem>, keys: &[QueryKey]) {
    for (id, key) in keys.iter().enumerate() {
        client.set_query_data(key.clone(), BenchItem::new(id as u64));
    }
}

/// Benchmark 1: Hot Cache (all hits, pure lookup performance)
fn bench_hot_cache(c: &mut Criterion, config: &BenchConfig) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("hot_cache");
    group.sample_size(config.sample_size);

    let remote = FakeRemote::new(config.source_latency_ms);
    let keys = KeyGenerator::new(config.num_keys).sequential();
    let client = rt.block_on(async {
        let client = setup_fresh_client(&remote);
        populate(&client, &keys);
        client
    });

    group.throughput(Throughput::Elements(keys.len() as u64));
    group.bench_function("get", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(client.get(key));
            }
        });
    });

    // subscribe + drop on fresh entries: no fetch, only observer bookkeeping
    group.bench_function("subscribe", |b| {
        b.to_async(&rt).iter(|| async {
            for key in &keys {
                let subscription = client.subscribe(key.clone());
                black_box(subscription.data());
            }
        });
    });

    group.finish();
}

/// Benchmark 2: Revalidation (every read goes to the remote)
fn bench_revalidation(c: &mut Criterion, config: &BenchConfig) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("revalidation");
    group.sample_size(config.sample_size.min(20)); // Fewer samples due to remote latency
    group.measurement_time(Duration::from_secs(20));

    let remote = FakeRemote::new(config.source_latency_ms);
    let keys = KeyGenerator::new(config.num_keys).sequential();
    let client = rt.block_on(async { setup_stale_client(&remote) });

    for batch in [1usize, 10, 50] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("fetch_many", batch), &batch, |b, &batch| {
            b.to_async(&rt).iter(|| async {
                let results = client.fetch_many(keys.iter().take(batch).cloned()).await;
                black_box(results);
            });
        });
    }

    group.finish();
}

/// Benchmark 3: Coalescing (many concurrent readers of few keys)
fn bench_coalescing(c: &mut Criterion, config: &BenchConfig) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("coalescing");
    group.sample_size(config.sample_size.min(50));

    let remote = FakeRemote::new(config.source_latency_ms);
    let key_gen = KeyGenerator::new(config.num_keys.min(100));

    for readers in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(readers as u64));
        group.bench_with_input(BenchmarkId::new("zipf", readers), &readers, |b, &readers| {
            b.to_async(&rt).iter(|| {
                // a fresh client per iteration so every key starts cold
                let client = setup_fresh_client(&remote);
                let keys = key_gen.zipf_random(readers);
                async move {
                    let results = join_all(keys.into_iter().map(|key| {
                        let client = client.clone();
                        async move { client.fetch(key).await }
                    }))
                    .await;
                    black_box(results);
                }
            });
        });
    }

    group.finish();
}

fn run_benchmarks(c: &mut Criterion) {
    let config = BenchConfig::new();

    eprintln!("\n=== Running Benchmarks ===\n");

    bench_hot_cache(c, &config);
    bench_revalidation(c, &config);
    bench_coalescing(c, &config);
}

criterion_group!(benches, run_benchmarks);
criterion_main!(benches);
