//! Shared defaults for caching, retries and admission control.
//!
//! Every value here can be overridden through configuration; these are the
//! figures the service ships with.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE TTLS
// ═══════════════════════════════════════════════════════════════════════════════

/// Weather readings stay fresh for 30 minutes.
pub const WEATHER_TTL: Duration = Duration::from_secs(1800);

/// News pages stay fresh for 15 minutes.
pub const NEWS_TTL: Duration = Duration::from_secs(900);

/// Market quotes move quickly; 5 minutes.
pub const STOCKS_TTL: Duration = Duration::from_secs(300);

/// Aggregated results share the shortest component TTL.
pub const AGGREGATE_TTL: Duration = Duration::from_secs(300);

/// Interval between background sweeps of the cache.
pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════════════════════════
// RETRY POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Retries after the first attempt (4 tries in total).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Backoff before retry `n` is `factor * 2^n` seconds.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.5;

/// Ceiling on a single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Per-attempt connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-attempt total timeout. Retries get a fresh budget each.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ═══════════════════════════════════════════════════════════════════════════════
// ADMISSION CONTROL
// ═══════════════════════════════════════════════════════════════════════════════

/// Inbound requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: usize = 60;

/// Inbound admission window.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Calls per window allowed against any single upstream.
pub const DEFAULT_UPSTREAM_MAX_REQUESTS: usize = 30;

/// Upstream throttling window.
pub const DEFAULT_UPSTREAM_RATE_WINDOW: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════════════════════════
// PAYLOAD LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Articles returned per news page.
pub const MAX_NEWS_ARTICLES: usize = 10;

/// Display name of the news provider.
pub const NEWS_SOURCE_NAME: &str = "NewsAPI";
