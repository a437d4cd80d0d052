//! Per-kind query configuration.
//!
//! All behavioural differences between resource kinds are expressed here. The
//! cache looks up the record for a key's kind once, when the entry is created.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::SyncError;

const DEFAULT_STALE_MS: u64 = 0;
const DEFAULT_GC_MS: u64 = 5 * 60 * 1000;
const DEFAULT_RETRY: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Upper bound for the exponential retry backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Tunables for one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long (ms) after a successful fetch the data is served without refetching.
    pub stale_ms: u64,
    /// How long (ms) an unobserved entry is kept before it is removed.
    pub gc_ms: u64,
    /// Revalidate observed entries when the window regains focus.
    pub refetch_on_regain_observer: bool,
    /// Revalidate observed entries when the network comes back.
    pub refetch_on_reconnect: bool,
    /// Revalidate observed entries on this period (ms), if set.
    pub refetch_interval_ms: Option<u64>,
    /// Retries after the first failed attempt of a fetch.
    pub retry: u32,
    /// Base delay (ms) between attempts; doubled on every retry.
    pub retry_delay_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            stale_ms: DEFAULT_STALE_MS,
            gc_ms: DEFAULT_GC_MS,
            refetch_on_regain_observer: true,
            refetch_on_reconnect: true,
            refetch_interval_ms: None,
            retry: DEFAULT_RETRY,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl QueryConfig {
    pub fn stale_window(&self) -> Duration {
        Duration::from_millis(self.stale_ms)
    }

    pub fn gc_window(&self) -> Duration {
        Duration::from_millis(self.gc_ms)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.refetch_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn with_stale_ms(mut self, stale_ms: u64) -> Self {
        self.stale_ms = stale_ms;
        self
    }

    pub fn with_gc_ms(mut self, gc_ms: u64) -> Self {
        self.gc_ms = gc_ms;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn with_refetch_interval_ms(mut self, interval_ms: u64) -> Self {
        self.refetch_interval_ms = Some(interval_ms);
        self
    }

    pub fn with_refetch_on_regain_observer(mut self, enabled: bool) -> Self {
        self.refetch_on_regain_observer = enabled;
        self
    }

    pub fn with_refetch_on_reconnect(mut self, enabled: bool) -> Self {
        self.refetch_on_reconnect = enabled;
        self
    }
}

/// Configuration for a whole client: defaults plus per-kind overrides.
///
/// # Example
/// ```ignore
/// let config = ClientConfig::from_json_str(r#"{
///     "defaults": { "gc_ms": 60000 },
///     "kinds": { "store": { "stale_ms": 30000 } }
/// }"#)?;
/// assert_eq!(config.config_for("store").stale_ms, 30_000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Applied to every kind without an override.
    pub defaults: QueryConfig,
    /// Overrides keyed by resource kind (the first key segment).
    pub kinds: HashMap<String, QueryConfig>,
}

impl ClientConfig {
    pub fn new(defaults: QueryConfig) -> Self {
        ClientConfig {
            defaults,
            kinds: HashMap::new(),
        }
    }

    /// Parse a configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Register the record used for `kind`.
    pub fn with_kind(mut self, kind: &str, config: QueryConfig) -> Self {
        self.kinds.insert(kind.to_string(), config);
        self
    }

    /// Look up the record for a resource kind.
    pub fn config_for(&self, kind: &str) -> QueryConfig {
        self.kinds
            .get(kind)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }
}
