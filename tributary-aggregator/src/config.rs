//! Aggregator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tributary_cache::CacheConfig;
use tributary_core::constants::{DEFAULT_UPSTREAM_MAX_REQUESTS, DEFAULT_UPSTREAM_RATE_WINDOW};
use tributary_core::types::Resource;
use tributary_limiter::RateLimitConfig;

/// Cache TTL per resource, in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPolicy {
    /// Weather readings
    pub weather_seconds: u64,
    /// News pages
    pub news_seconds: u64,
    /// Stock quotes
    pub stocks_seconds: u64,
    /// Combined results
    pub aggregate_seconds: u64,
}

impl TtlPolicy {
    /// TTL for a resource.
    pub fn ttl_for(&self, resource: Resource) -> Duration {
        let secs = match resource {
            Resource::Weather => self.weather_seconds,
            Resource::News => self.news_seconds,
            Resource::Stocks => self.stocks_seconds,
            Resource::Aggregate => self.aggregate_seconds,
        };
        Duration::from_secs(secs)
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            weather_seconds: Resource::Weather.default_ttl().as_secs(),
            news_seconds: Resource::News.default_ttl().as_secs(),
            stocks_seconds: Resource::Stocks.default_ttl().as_secs(),
            aggregate_seconds: Resource::Aggregate.default_ttl().as_secs(),
        }
    }
}

/// Everything the aggregator needs besides its upstream source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Cache TTLs
    pub ttl: TtlPolicy,
    /// Inbound admission (hard rejection)
    pub admission: RateLimitConfig,
    /// Per-upstream throttling (cooperative wait)
    pub upstream: RateLimitConfig,
    /// Cache sweeper
    pub cache: CacheConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            ttl: TtlPolicy::default(),
            admission: RateLimitConfig::default(),
            upstream: RateLimitConfig {
                max_requests: DEFAULT_UPSTREAM_MAX_REQUESTS,
                window_seconds: DEFAULT_UPSTREAM_RATE_WINDOW.as_secs(),
            },
            cache: CacheConfig::default(),
        }
    }
}
