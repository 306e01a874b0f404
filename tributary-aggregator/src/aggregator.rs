//! The aggregation service.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use tributary_cache::{CacheManager, CacheStats};
use tributary_core::error::{Result, TributaryError};
use tributary_core::key::cache_key;
use tributary_core::traits::{Cacheable, UpstreamSource};
use tributary_core::types::{
    AggregatedResult, CachedResource, NewsPage, Resource, StockQuote, WeatherReading,
};
use tributary_limiter::{PerEndpointRateLimiter, RateLimiter};

use crate::config::{AggregatorConfig, TtlPolicy};

/// Serves weather, news and quotes from cache or upstream.
///
/// Cloning the `Arc`s out is how callers share the cache and limiters with
/// other components (e.g. a stats endpoint).
pub struct Aggregator {
    source: Arc<dyn UpstreamSource>,
    cache: Arc<CacheManager<CachedResource>>,
    admission: Arc<RateLimiter>,
    upstream_limits: Arc<PerEndpointRateLimiter>,
    ttl: TtlPolicy,
}

impl Aggregator {
    /// Creates an aggregator over `source`. The cache sweeper is not started.
    pub fn new(source: Arc<dyn UpstreamSource>, config: AggregatorConfig) -> Self {
        Self {
            source,
            cache: Arc::new(CacheManager::with_config(config.cache)),
            admission: Arc::new(RateLimiter::with_config(&config.admission)),
            upstream_limits: Arc::new(PerEndpointRateLimiter::with_config(&config.upstream)),
            ttl: config.ttl,
        }
    }

    /// The response cache.
    pub fn cache(&self) -> &Arc<CacheManager<CachedResource>> {
        &self.cache
    }

    /// The inbound admission limiter.
    pub fn admission(&self) -> &Arc<RateLimiter> {
        &self.admission
    }

    /// The per-upstream limiters, keyed by resource name.
    pub fn upstream_limits(&self) -> &Arc<PerEndpointRateLimiter> {
        &self.upstream_limits
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Starts the cache sweeper.
    pub fn start(&self) {
        self.cache.start();
    }

    /// Stops the cache sweeper and waits for it to exit.
    pub async fn shutdown(&self) {
        self.cache.stop().await;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PUBLIC OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current weather for `location`.
    pub async fn weather(&self, location: &str) -> Result<WeatherReading> {
        let location = require("location", location)?;
        self.admit()?;
        self.resolve_weather(location).await
    }

    /// Latest articles matching `query`.
    pub async fn news(&self, query: &str) -> Result<NewsPage> {
        let query = require("query", query)?;
        self.admit()?;
        self.resolve_news(query).await
    }

    /// Latest quote for `symbol`.
    pub async fn stocks(&self, symbol: &str) -> Result<StockQuote> {
        let symbol = require("symbol", symbol)?;
        self.admit()?;
        self.resolve_stock(symbol).await
    }

    /// Weather, news and a quote, fetched concurrently.
    ///
    /// All three sub-fetches run to completion. If any fails, the first failure
    /// in weather, news, stocks order is returned wrapped in
    /// [`TributaryError::Aggregate`] and nothing is stored under the combined
    /// key. Sub-results that did succeed stay in the cache under their own keys.
    #[instrument(skip(self))]
    pub async fn fetch_all(
        &self,
        location: &str,
        news_query: &str,
        stock_symbol: &str,
    ) -> Result<AggregatedResult> {
        let location = require("location", location)?;
        let news_query = require("news_query", news_query)?;
        let stock_symbol = require("stock_symbol", stock_symbol)?;
        self.admit()?;

        let key = cache_key(Resource::Aggregate, &[location, news_query, stock_symbol]);
        if let Some(hit) = self.cached::<AggregatedResult>(&key) {
            info!(key = %key, "Returning cached aggregate");
            return Ok(hit);
        }

        let start = Instant::now();
        let (weather, news, stocks) = tokio::join!(
            self.resolve_weather(location),
            self.resolve_news(news_query),
            self.resolve_stock(stock_symbol),
        );

        let (weather, news, stocks) = match all_three(weather, news, stocks) {
            Ok(parts) => parts,
            Err(cause) => {
                error!(error = %cause, "Error aggregating data");
                return Err(TributaryError::aggregate(cause));
            }
        };

        let result = AggregatedResult {
            weather,
            news,
            stocks,
            fetched_at: Utc::now(),
            execution_time: start.elapsed().as_secs_f64(),
        };

        info!(
            execution_time = result.execution_time,
            "Aggregated data from all upstreams"
        );
        self.store(key, result.clone());
        Ok(result)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RESOURCE FLOWS
    // ═══════════════════════════════════════════════════════════════════════════

    async fn resolve_weather(&self, location: &str) -> Result<WeatherReading> {
        self.resolve(location, || self.source.weather(location)).await
    }

    async fn resolve_news(&self, query: &str) -> Result<NewsPage> {
        self.resolve(query, || self.source.news(query)).await
    }

    async fn resolve_stock(&self, symbol: &str) -> Result<StockQuote> {
        self.resolve(symbol, || self.source.stock(symbol)).await
    }

    /// Cache lookup, then throttled upstream fetch, then store.
    async fn resolve<T, F, Fut>(&self, identifier: &str, fetch: F) -> Result<T>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let resource = T::RESOURCE;
        let key = cache_key(resource, &[identifier]);

        if let Some(hit) = self.cached::<T>(&key) {
            info!(%resource, identifier, "Returning cached data");
            return Ok(hit);
        }

        let waited = self.upstream_limits.wait_if_needed(resource.name()).await;
        if !waited.is_zero() {
            debug!(%resource, waited_ms = waited.as_millis() as u64, "Upstream throttled");
        }

        let start = Instant::now();
        let value = fetch().await.map_err(|e| {
            warn!(%resource, identifier, error = %e, "Upstream fetch failed");
            e
        })?;

        info!(
            %resource,
            identifier,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched from upstream"
        );
        self.store(key, value.clone());
        Ok(value)
    }

    fn cached<T: Cacheable>(&self, key: &str) -> Option<T> {
        self.cache.get(key).and_then(T::from_cached)
    }

    fn store<T: Cacheable>(&self, key: String, value: T) {
        self.cache
            .set(key, value.into_cached(), self.ttl.ttl_for(T::RESOURCE));
    }

    fn admit(&self) -> Result<()> {
        if self.admission.is_allowed() {
            Ok(())
        } else {
            Err(TributaryError::LocalRateLimitExceeded)
        }
    }
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TributaryError::Validation(format!("'{}' must not be empty", field)));
    }
    Ok(trimmed)
}

fn all_three<A, B, C>(a: Result<A>, b: Result<B>, c: Result<C>) -> Result<(A, B, C)> {
    Ok((a?, b?, c?))
}
