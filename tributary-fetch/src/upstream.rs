//! HTTP clients for the weather, news and quote providers.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tributary_core::constants::{CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use tributary_core::error::{Result, TributaryError};
use tributary_core::traits::UpstreamSource;
use tributary_core::types::{NewsBatch, NewsPage, StockQuote, WeatherReading};

use crate::parse;
use crate::retry::{RetryPolicy, RetryingFetcher};

const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const DEFAULT_NEWS_URL: &str = "https://newsapi.org/v2/everything";
const DEFAULT_STOCK_URL: &str = "https://www.alphavantage.co/query";

/// Upstream endpoints, credentials and fetch behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Current-weather endpoint
    pub weather_url: String,
    /// Weather API key
    pub weather_api_key: String,
    /// News search endpoint
    pub news_url: String,
    /// News API key
    pub news_api_key: String,
    /// Quote endpoint
    pub stock_url: String,
    /// Quote API key
    pub stock_api_key: String,
    /// Per-attempt connect timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Per-attempt total timeout in seconds
    pub timeout_seconds: u64,
    /// Retry budget shared by all three clients
    pub retry: RetryPolicy,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            weather_url: DEFAULT_WEATHER_URL.into(),
            weather_api_key: String::new(),
            news_url: DEFAULT_NEWS_URL.into(),
            news_api_key: String::new(),
            stock_url: DEFAULT_STOCK_URL.into(),
            stock_api_key: String::new(),
            connect_timeout_seconds: CONNECT_TIMEOUT.as_secs(),
            timeout_seconds: REQUEST_TIMEOUT.as_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl UpstreamConfig {
    /// Points all three providers at one base URL (mock servers, proxies).
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            weather_url: format!("{}/weather", base),
            news_url: format!("{}/news", base),
            stock_url: format!("{}/query", base),
            ..Default::default()
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

struct PageCursor {
    page: u32,
    total_results: Option<u64>,
    done: bool,
}

/// Client for all three providers.
///
/// Each call is a single logical fetch through [`RetryingFetcher`], followed
/// by payload validation in [`parse`].
#[derive(Clone, Debug)]
pub struct HttpUpstream {
    config: UpstreamConfig,
    fetcher: RetryingFetcher,
}

impl HttpUpstream {
    /// Creates the clients from configuration.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        for (provider, url) in [
            ("weather", &config.weather_url),
            ("news", &config.news_url),
            ("stocks", &config.stock_url),
        ] {
            reqwest::Url::parse(url).map_err(|e| {
                TributaryError::Config(format!("invalid {} URL '{}': {}", provider, url, e))
            })?;
        }

        let fetcher = RetryingFetcher::with_timeouts(
            config.retry.clone(),
            Duration::from_secs(config.connect_timeout_seconds),
            Duration::from_secs(config.timeout_seconds),
        )?;
        Ok(Self { config, fetcher })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Streams a news search page by page.
    ///
    /// Stops after the page that reaches the reported total, after an empty
    /// page, or after the first error (which is yielded).
    pub fn news_pages<'a>(
        &'a self,
        query: &'a str,
        page_size: u32,
    ) -> impl Stream<Item = Result<NewsBatch>> + 'a {
        let page_size = page_size.max(1);
        let cursor = PageCursor {
            page: 1,
            total_results: None,
            done: false,
        };

        stream::unfold(cursor, move |mut cursor| async move {
            if cursor.done {
                return None;
            }
            if let Some(total) = cursor.total_results {
                if u64::from(cursor.page - 1) * u64::from(page_size) >= total {
                    return None;
                }
            }

            let params = [
                ("q", query.to_string()),
                ("page", cursor.page.to_string()),
                ("pageSize", page_size.to_string()),
                ("apiKey", self.config.news_api_key.clone()),
            ];
            let result = match self.fetcher.fetch(&self.config.news_url, &params).await {
                Ok(raw) => parse::news_batch(query, cursor.page, page_size, raw),
                Err(e) => Err(e),
            };

            match result {
                Ok((batch, total)) => {
                    cursor.total_results = Some(total);
                    cursor.done = batch.articles.is_empty();
                    cursor.page += 1;
                    Some((Ok(batch), cursor))
                }
                Err(e) => {
                    cursor.done = true;
                    Some((Err(e), cursor))
                }
            }
        })
    }
}

#[async_trait]
impl UpstreamSource for HttpUpstream {
    #[instrument(skip(self))]
    async fn weather(&self, location: &str) -> Result<WeatherReading> {
        let params = [
            ("q", location.to_string()),
            ("units", "metric".to_string()),
            ("appid", self.config.weather_api_key.clone()),
        ];
        let raw = self.fetcher.fetch(&self.config.weather_url, &params).await?;
        parse::weather(location, raw)
    }

    #[instrument(skip(self))]
    async fn news(&self, query: &str) -> Result<NewsPage> {
        let params = [
            ("q", query.to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("apiKey", self.config.news_api_key.clone()),
        ];
        let raw = self.fetcher.fetch(&self.config.news_url, &params).await?;
        parse::news(query, raw)
    }

    #[instrument(skip(self))]
    async fn stock(&self, symbol: &str) -> Result<StockQuote> {
        let params = [
            ("function", "GLOBAL_QUOTE".to_string()),
            ("symbol", symbol.to_string()),
            ("apikey", self.config.stock_api_key.clone()),
        ];
        let raw = self.fetcher.fetch(&self.config.stock_url, &params).await?;
        parse::stock(symbol, raw)
    }
}
