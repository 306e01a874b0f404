//! DTOs for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tributary_cache::CacheStats;

/// Query for `GET /api/weather`.
///
/// Parameters default to empty so a missing one is reported the same way as
/// a blank one.
#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    #[serde(default)]
    pub location: String,
}

/// Query for `GET /api/news`.
#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    pub query: String,
}

/// Query for `GET /api/stocks`.
#[derive(Debug, Deserialize)]
pub struct StocksQuery {
    #[serde(default)]
    pub symbol: String,
}

/// Query for `GET /api/aggregate`.
#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub news_query: String,
    #[serde(default)]
    pub stock_symbol: String,
}

/// Response for `GET /`.
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Response for `GET /api/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub rate_limit: RateLimitStats,
    /// Upstreams contacted since startup
    pub upstream_limiters: usize,
}

/// Inbound admission counters.
#[derive(Debug, Serialize)]
pub struct RateLimitStats {
    pub max_requests: usize,
    pub window_seconds: u64,
    /// Requests still admissible in the current window
    pub remaining: usize,
}
