//! App state: the aggregator and its configuration.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use tributary_aggregator::{Aggregator, AggregatorConfig};
use tributary_cache::CacheConfig;
use tributary_core::error::Result;
use tributary_core::traits::UpstreamSource;
use tributary_fetch::{HttpUpstream, RetryPolicy, UpstreamConfig};
use tributary_limiter::RateLimitConfig;

/// Server configuration.
#[derive(Clone, Debug, Default)]
pub struct ApiConfig {
    /// Provider endpoints, keys, timeouts and retry policy
    pub upstream: UpstreamConfig,
    /// TTLs, rate limits and sweep interval
    pub aggregator: AggregatorConfig,
}

impl ApiConfig {
    /// Loads `.env` (if present) and reads configuration from the environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`. Missing or blank variables keep
    /// their defaults; unparseable numbers keep the default and log a warning.
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let up = defaults.upstream;
        let agg = defaults.aggregator;

        let upstream = UpstreamConfig {
            weather_url: string_var(&lookup, "WEATHER_API_URL", up.weather_url),
            weather_api_key: string_var(&lookup, "WEATHER_API_KEY", up.weather_api_key),
            news_url: string_var(&lookup, "NEWS_API_URL", up.news_url),
            news_api_key: string_var(&lookup, "NEWS_API_KEY", up.news_api_key),
            stock_url: string_var(&lookup, "STOCK_API_URL", up.stock_url),
            stock_api_key: string_var(&lookup, "STOCK_API_KEY", up.stock_api_key),
            connect_timeout_seconds: parse_var(
                &lookup,
                "FETCH_CONNECT_TIMEOUT_SECS",
                up.connect_timeout_seconds,
            ),
            timeout_seconds: parse_var(&lookup, "FETCH_TIMEOUT_SECS", up.timeout_seconds),
            retry: RetryPolicy {
                max_retries: parse_var(&lookup, "FETCH_MAX_RETRIES", up.retry.max_retries),
                backoff_factor: parse_var(
                    &lookup,
                    "FETCH_BACKOFF_FACTOR",
                    up.retry.backoff_factor,
                ),
            },
        };

        let aggregator = AggregatorConfig {
            ttl: agg.ttl,
            admission: RateLimitConfig {
                max_requests: parse_var(
                    &lookup,
                    "RATE_LIMIT_MAX_REQUESTS",
                    agg.admission.max_requests,
                ),
                window_seconds: parse_var(
                    &lookup,
                    "RATE_LIMIT_WINDOW_SECS",
                    agg.admission.window_seconds,
                ),
            },
            upstream: RateLimitConfig {
                max_requests: parse_var(
                    &lookup,
                    "UPSTREAM_RATE_LIMIT_MAX_REQUESTS",
                    agg.upstream.max_requests,
                ),
                window_seconds: parse_var(
                    &lookup,
                    "UPSTREAM_RATE_LIMIT_WINDOW_SECS",
                    agg.upstream.window_seconds,
                ),
            },
            cache: CacheConfig {
                sweep_interval_seconds: parse_var(
                    &lookup,
                    "CACHE_SWEEP_INTERVAL_SECS",
                    agg.cache.sweep_interval_seconds,
                ),
            },
        };

        Self {
            upstream,
            aggregator,
        }
    }
}

fn read<L: Fn(&str) -> Option<String>>(lookup: &L, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn string_var<L: Fn(&str) -> Option<String>>(lookup: &L, name: &str, default: String) -> String {
    read(lookup, name).unwrap_or(default)
}

fn parse_var<T, L>(lookup: &L, name: &str, default: T) -> T
where
    T: FromStr + Display,
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = read(lookup, name) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(var = name, value = %raw, default = %default, "Invalid value, using default");
            default
        }
    }
}

/// Shared application context.
pub struct AppState {
    pub config: ApiConfig,
    pub aggregator: Aggregator,
}

impl AppState {
    /// Builds the context with HTTP clients for the configured upstreams.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let upstream = HttpUpstream::new(config.upstream.clone())?;
        Ok(Self::with_source(config, Arc::new(upstream)))
    }

    /// Builds the context around any upstream source.
    pub fn with_source(config: ApiConfig, source: Arc<dyn UpstreamSource>) -> Self {
        let aggregator = Aggregator::new(source, config.aggregator.clone());
        Self { config, aggregator }
    }

    /// Starts background maintenance.
    pub fn start(&self) {
        self.aggregator.start();
        info!("Application started");
    }

    /// Stops background maintenance and waits for it to finish.
    pub async fn shutdown(&self) {
        self.aggregator.shutdown().await;
        info!("Application shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = ApiConfig::from_lookup(|_| None);
        assert!(config.upstream.news_url.contains("newsapi"));
        assert!(config.upstream.news_api_key.is_empty());
        assert_eq!(config.aggregator.admission.max_requests, 60);
        assert_eq!(config.aggregator.upstream.max_requests, 30);
        assert_eq!(config.aggregator.cache.sweep_interval_seconds, 60);
        assert_eq!(config.upstream.retry.backoff_factor, 0.5);
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("WEATHER_API_URL", "http://localhost:9000/weather"),
            ("STOCK_API_KEY", " secret "),
            ("RATE_LIMIT_MAX_REQUESTS", "5"),
            ("RATE_LIMIT_WINDOW_SECS", "10"),
            ("FETCH_MAX_RETRIES", "1"),
            ("FETCH_BACKOFF_FACTOR", "0.25"),
            ("CACHE_SWEEP_INTERVAL_SECS", "15"),
        ]));

        assert_eq!(config.upstream.weather_url, "http://localhost:9000/weather");
        assert_eq!(config.upstream.stock_api_key, "secret");
        assert_eq!(config.aggregator.admission.max_requests, 5);
        assert_eq!(config.aggregator.admission.window_seconds, 10);
        assert_eq!(config.upstream.retry.max_retries, 1);
        assert_eq!(config.upstream.retry.backoff_factor, 0.25);
        assert_eq!(config.aggregator.cache.sweep_interval_seconds, 15);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("RATE_LIMIT_MAX_REQUESTS", "lots"),
            ("FETCH_TIMEOUT_SECS", "-3"),
            ("UPSTREAM_RATE_LIMIT_WINDOW_SECS", ""),
        ]));

        assert_eq!(config.aggregator.admission.max_requests, 60);
        assert_eq!(config.upstream.timeout_seconds, 10);
        assert_eq!(config.aggregator.upstream.window_seconds, 60);
    }

    #[tokio::test]
    async fn test_state_lifecycle() {
        let state = AppState::new(ApiConfig::default()).unwrap();
        state.start();
        assert!(state.aggregator.cache().is_running());
        state.shutdown().await;
        assert!(!state.aggregator.cache().is_running());
    }
}
