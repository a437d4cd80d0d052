use std::env;

/// Configuration for benchmarks, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Simulated remote latency in milliseconds (from SOURCE_LATENCY_MS env var, defaults to 5)
    pub source_latency_ms: u64,

    /// Number of distinct query keys (from BENCH_KEYS env var, defaults to 10000)
    pub num_keys: usize,

    /// Sample size for benchmarks (from BENCH_SAMPLE_SIZE env var, defaults to 100)
    pub sample_size: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            source_latency_ms: env_or("SOURCE_LATENCY_MS", 5),
            num_keys: env_or("BENCH_KEYS", 10_000),
            sample_size: env_or("BENCH_SAMPLE_SIZE", 100),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        let config = Self::default();
        eprintln!("Benchmark Configuration:");
        eprintln!("  Source Latency: {}ms", config.source_latency_ms);
        eprintln!("  Keys: {}", config.num_keys);
        eprintln!("  Sample Size: {}", config.sample_size);
        config
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
