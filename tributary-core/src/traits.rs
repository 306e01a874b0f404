//! Common traits for Tributary.
//!
//! [`UpstreamSource`] separates the orchestration layer (cache, admission,
//! fan-out) from the HTTP clients that talk to the real providers, so the
//! aggregator can run against stubs in tests.

use async_trait::async_trait;

use crate::error::Result;
pub use crate::types::Cacheable;
use crate::types::{NewsPage, StockQuote, WeatherReading};

/// Interface to the three upstream providers.
///
/// Implementations must be safe for unlimited concurrent use. Each call is
/// one logical fetch; retries, timeouts and payload validation happen inside.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Fetches current weather for a location.
    async fn weather(&self, location: &str) -> Result<WeatherReading>;

    /// Fetches the top articles for a search query.
    async fn news(&self, query: &str) -> Result<NewsPage>;

    /// Fetches the latest quote for a ticker symbol.
    async fn stock(&self, symbol: &str) -> Result<StockQuote>;
}
