use super::keys;
use crate::config::{ClientConfig, QueryConfig};

/// Per-kind tuning the catalog client ships with.
///
/// | kind | stale | triggers |
/// |---|---|---|
/// | store | 30s | focus, reconnect |
/// | categories | 60s | focus, reconnect |
/// | item, items | 0 | focus, reconnect |
/// | health | 0 | poll every 30s, no retry |
pub fn default_config() -> ClientConfig {
    ClientConfig::default()
        .with_kind(keys::STORE, QueryConfig::default().with_stale_ms(30_000))
        .with_kind(keys::CATEGORIES, QueryConfig::default().with_stale_ms(60_000))
        .with_kind(
            keys::HEALTH,
            QueryConfig::default()
                .with_refetch_interval_ms(30_000)
                .with_retry(0),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn kinds_get_their_windows() {
        let config = default_config();
        assert_eq!(config.config_for(keys::STORE).stale_window(), Duration::from_secs(30));
        assert_eq!(
            config.config_for(keys::CATEGORIES).stale_window(),
            Duration::from_secs(60)
        );
        assert_eq!(config.config_for(keys::ITEM), QueryConfig::default());
        assert_eq!(config.config_for(keys::ITEMS), QueryConfig::default());

        let health = config.config_for(keys::HEALTH);
        assert_eq!(health.poll_interval(), Some(Duration::from_secs(30)));
        assert_eq!(health.retry, 0);
    }
}
