//! Platform configuration.

use std::time::Duration;

use common::LocationId;
use stock::AllocatorConfig;

/// Tunables for the assembled platform, overridable via environment
/// variables.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Delivery attempts per queued event before dead-lettering.
    pub max_deliveries: u32,

    /// Lifetime of saga idempotency markers.
    pub marker_ttl: Duration,

    /// Retry policy of the stock allocator.
    pub allocator: AllocatorConfig,

    /// Warehouse location finished goods are received into.
    pub finished_goods_location: LocationId,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            marker_ttl: Duration::from_secs(24 * 60 * 60),
            allocator: AllocatorConfig::default(),
            finished_goods_location: LocationId::new("FG-MAIN"),
        }
    }
}

impl PlatformConfig {
    /// Loads the configuration from the environment, falling back to
    /// the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_deliveries: env_parse("PLATFORM_MAX_DELIVERIES")
                .unwrap_or(defaults.max_deliveries),
            marker_ttl: env_parse("PLATFORM_MARKER_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.marker_ttl),
            allocator: AllocatorConfig {
                max_attempts: env_parse("PLATFORM_ALLOCATOR_ATTEMPTS")
                    .unwrap_or(defaults.allocator.max_attempts),
                base_backoff: env_parse("PLATFORM_ALLOCATOR_BACKOFF_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.allocator.base_backoff),
            },
            finished_goods_location: std::env::var("PLATFORM_FG_LOCATION")
                .map(LocationId::new)
                .unwrap_or(defaults.finished_goods_location),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PlatformConfig::default();
        assert_eq!(config.max_deliveries, 5);
        assert_eq!(config.allocator.max_attempts, 5);
        assert_eq!(config.finished_goods_location.as_str(), "FG-MAIN");
    }
}
