//! Domain types for Tributary.
//!
//! - [`WeatherReading`], [`NewsPage`], [`StockQuote`]: typed upstream results
//! - [`AggregatedResult`]: the composite of all three
//! - [`CachedResource`]: what the cache stores
//! - [`Resource`]: resource kinds, their names and default TTLs

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{AGGREGATE_TTL, NEWS_TTL, STOCKS_TTL, WEATHER_TTL};

// ═══════════════════════════════════════════════════════════════════════════════
// RESOURCE KINDS
// ═══════════════════════════════════════════════════════════════════════════════

/// A logical resource served by the aggregator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// Current weather for a location
    Weather,
    /// News articles for a search query
    News,
    /// Latest quote for a ticker symbol
    Stocks,
    /// Weather + news + stocks in one result
    Aggregate,
}

impl Resource {
    /// Stable lowercase name, used in cache keys, limiter keys and errors.
    pub fn name(self) -> &'static str {
        match self {
            Resource::Weather => "weather",
            Resource::News => "news",
            Resource::Stocks => "stocks",
            Resource::Aggregate => "aggregate",
        }
    }

    /// Default cache TTL for this resource.
    pub fn default_ttl(self) -> Duration {
        match self {
            Resource::Weather => WEATHER_TTL,
            Resource::News => NEWS_TTL,
            Resource::Stocks => STOCKS_TTL,
            Resource::Aggregate => AGGREGATE_TTL,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// UPSTREAM RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Current conditions at a location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Location as requested by the caller
    pub location: String,
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Human-readable conditions ("light rain")
    pub conditions: String,
    /// Relative humidity in percent, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,
    /// When the reading was captured
    pub timestamp: DateTime<Utc>,
}

/// Publisher of a news article.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    /// Provider-assigned id
    #[serde(default)]
    pub id: Option<String>,
    /// Publisher name
    #[serde(default)]
    pub name: Option<String>,
}

/// A single news article, in the provider's field naming.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub source: Option<ArticleSource>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// The top articles for a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsPage {
    /// At most [`MAX_NEWS_ARTICLES`](crate::constants::MAX_NEWS_ARTICLES) articles
    pub articles: Vec<Article>,
    /// Provider name
    pub source: String,
    /// Total matches reported by the provider
    pub total_results: u64,
    /// When the page was captured
    pub timestamp: DateTime<Utc>,
}

/// One page of a paginated news query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsBatch {
    /// 1-based page number
    pub page: u32,
    /// Articles on this page
    pub articles: Vec<Article>,
    /// Total pages at the requested page size
    pub total_pages: u64,
}

/// Latest quote for a ticker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    /// Ticker symbol as requested
    pub symbol: String,
    /// Last traded price
    pub price: f64,
    /// Absolute change since previous close
    pub change: f64,
    /// Shares traded in the session
    pub volume: u64,
    /// When the quote was captured
    pub timestamp: DateTime<Utc>,
}

/// Weather, news and a quote fetched together.
///
/// Only ever constructed when all three sub-fetches succeeded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub weather: WeatherReading,
    pub news: NewsPage,
    pub stocks: StockQuote,
    /// When the joint fetch completed
    pub fetched_at: DateTime<Utc>,
    /// Wall-clock duration of the joint fetch, in seconds
    pub execution_time: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHED VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// Value stored in the aggregator's cache.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedResource {
    Weather(WeatherReading),
    News(NewsPage),
    Stocks(StockQuote),
    Aggregate(Box<AggregatedResult>),
}

impl CachedResource {
    /// The resource kind of the stored value.
    pub fn resource(&self) -> Resource {
        match self {
            CachedResource::Weather(_) => Resource::Weather,
            CachedResource::News(_) => Resource::News,
            CachedResource::Stocks(_) => Resource::Stocks,
            CachedResource::Aggregate(_) => Resource::Aggregate,
        }
    }
}

/// A result type that can round-trip through [`CachedResource`].
pub trait Cacheable: Clone + Send + Sync + Sized + 'static {
    /// Resource kind this type represents.
    const RESOURCE: Resource;

    /// Wraps the value for storage.
    fn into_cached(self) -> CachedResource;

    /// Unwraps a stored value, or `None` if it holds another resource kind.
    fn from_cached(cached: CachedResource) -> Option<Self>;
}

impl Cacheable for WeatherReading {
    const RESOURCE: Resource = Resource::Weather;

    fn into_cached(self) -> CachedResource {
        CachedResource::Weather(self)
    }

    fn from_cached(cached: CachedResource) -> Option<Self> {
        match cached {
            CachedResource::Weather(w) => Some(w),
            _ => None,
        }
    }
}

impl Cacheable for NewsPage {
    const RESOURCE: Resource = Resource::News;

    fn into_cached(self) -> CachedResource {
        CachedResource::News(self)
    }

    fn from_cached(cached: CachedResource) -> Option<Self> {
        match cached {
            CachedResource::News(n) => Some(n),
            _ => None,
        }
    }
}

impl Cacheable for StockQuote {
    const RESOURCE: Resource = Resource::Stocks;

    fn into_cached(self) -> CachedResource {
        CachedResource::Stocks(self)
    }

    fn from_cached(cached: CachedResource) -> Option<Self> {
        match cached {
            CachedResource::Stocks(s) => Some(s),
            _ => None,
        }
    }
}

impl Cacheable for AggregatedResult {
    const RESOURCE: Resource = Resource::Aggregate;

    fn into_cached(self) -> CachedResource {
        CachedResource::Aggregate(Box::new(self))
    }

    fn from_cached(cached: CachedResource) -> Option<Self> {
        match cached {
            CachedResource::Aggregate(a) => Some(*a),
            _ => None,
        }
    }
}
