//! Per-key rate limiting.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::window::{RateLimitConfig, RateLimiter};

/// Tracks an independent sliding window for every key.
///
/// Limiters are created on first use and kept for the life of the registry.
/// Creation goes through [`DashMap::entry`], which holds the shard lock across
/// the existence check and the insert, so concurrent first callers for the
/// same key always end up sharing one limiter.
#[derive(Debug)]
pub struct PerEndpointRateLimiter {
    max_requests: usize,
    window: Duration,
    limiters: DashMap<String, Arc<RateLimiter>>,
}

impl PerEndpointRateLimiter {
    /// Creates a registry whose limiters admit `max_requests` per `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            limiters: DashMap::new(),
        }
    }

    /// Creates a registry from configuration.
    pub fn with_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Returns the limiter for `key`, creating it atomically if absent.
    pub fn limiter_for(&self, key: &str) -> Arc<RateLimiter> {
        if let Some(existing) = self.limiters.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self.limiters.entry(key.to_string()).or_insert_with(|| {
            debug!(key, "Creating rate limiter");
            Arc::new(RateLimiter::new(self.max_requests, self.window))
        });
        Arc::clone(entry.value())
    }

    /// Admits a request for `key` if its window has room.
    pub fn is_allowed(&self, key: &str) -> bool {
        self.limiter_for(key).is_allowed()
    }

    /// Waits until `key`'s window has room. Returns the delay.
    pub async fn wait_if_needed(&self, key: &str) -> Duration {
        let limiter = self.limiter_for(key);
        limiter.wait_if_needed().await
    }

    /// Number of keys with a limiter.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Returns true if no key has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl Default for PerEndpointRateLimiter {
    fn default() -> Self {
        Self::with_config(&RateLimitConfig::default())
    }
}
