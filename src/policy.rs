//! Staleness and retry policy.
//!
//! Pure functions of entry metadata and the current time. Nothing here looks
//! at the resource kind; kind differences come in through [`QueryConfig`].

use std::time::Duration;
use tokio::time::Instant;

use crate::config::{MAX_RETRY_DELAY, QueryConfig};

/// Data may be served without a refetch.
///
/// Fresh means data is present and `now` is strictly before `stale_at`.
pub fn is_fresh(has_data: bool, stale_at: Option<Instant>, now: Instant) -> bool {
    has_data && stale_at.is_some_and(|stale_at| now < stale_at)
}

/// Whether a new subscriber must start a fetch.
///
/// Outstanding fetches are joined instead of duplicated.
pub fn should_fetch(
    has_data: bool,
    stale_at: Option<Instant>,
    fetch_in_flight: bool,
    now: Instant,
) -> bool {
    !fetch_in_flight && !is_fresh(has_data, stale_at, now)
}

/// Delay before retry number `attempt` (1-based): the base delay doubled per
/// attempt, capped at [`MAX_RETRY_DELAY`].
pub fn retry_delay(config: &QueryConfig, attempt: u32) -> Duration {
    let base = Duration::from_millis(config.retry_delay_ms);
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}
