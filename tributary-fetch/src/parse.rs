//! Validation of raw provider payloads.
//!
//! Each function decodes a successful upstream body into its typed result.
//! A well-formed body that lacks the data we need yields
//! [`TributaryError::NotFound`]; a body of the wrong shape yields
//! [`TributaryError::InvalidResponse`].

use std::collections::HashMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use tributary_core::constants::{MAX_NEWS_ARTICLES, NEWS_SOURCE_NAME};
use tributary_core::error::{Result, TributaryError};
use tributary_core::types::{Article, NewsBatch, NewsPage, Resource, StockQuote, WeatherReading};

fn decode<T: DeserializeOwned>(resource: Resource, raw: Value) -> Result<T> {
    serde_json::from_value(raw).map_err(|e| {
        TributaryError::InvalidResponse(format!("unexpected {} payload: {}", resource, e))
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// WEATHER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct RawWeather {
    #[serde(default)]
    main: Option<RawMain>,
    #[serde(default)]
    weather: Vec<RawCondition>,
}

#[derive(Deserialize)]
struct RawMain {
    #[serde(default)]
    temp: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
}

#[derive(Deserialize)]
struct RawCondition {
    #[serde(default)]
    description: Option<String>,
}

/// Builds a [`WeatherReading`] from a current-weather body.
pub fn weather(location: &str, raw: Value) -> Result<WeatherReading> {
    let raw: RawWeather = decode(Resource::Weather, raw)?;
    let missing = || TributaryError::not_found(Resource::Weather.name(), location);

    let main = raw.main.ok_or_else(missing)?;
    let temperature = main.temp.ok_or_else(missing)?;
    let conditions = raw
        .weather
        .into_iter()
        .next()
        .and_then(|c| c.description)
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(missing)?;

    Ok(WeatherReading {
        location: location.to_string(),
        temperature,
        conditions,
        humidity: main.humidity.map(|h| h.round().clamp(0.0, 100.0) as u8),
        timestamp: Utc::now(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// NEWS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct RawNews {
    #[serde(default)]
    articles: Option<Vec<Article>>,
    #[serde(rename = "totalResults", default)]
    total_results: Option<u64>,
}

fn news_parts(query: &str, raw: Value) -> Result<(Vec<Article>, u64)> {
    let raw: RawNews = decode(Resource::News, raw)?;
    match (raw.articles, raw.total_results) {
        (Some(articles), Some(total)) => Ok((articles, total)),
        _ => Err(TributaryError::not_found(Resource::News.name(), query)),
    }
}

/// Builds a [`NewsPage`] holding the top articles of a search body.
pub fn news(query: &str, raw: Value) -> Result<NewsPage> {
    let (mut articles, total_results) = news_parts(query, raw)?;
    articles.truncate(MAX_NEWS_ARTICLES);

    Ok(NewsPage {
        articles,
        source: NEWS_SOURCE_NAME.to_string(),
        total_results,
        timestamp: Utc::now(),
    })
}

/// Builds one [`NewsBatch`] of a paginated search. Also returns the total
/// result count so the caller knows when to stop.
pub fn news_batch(query: &str, page: u32, page_size: u32, raw: Value) -> Result<(NewsBatch, u64)> {
    let (articles, total_results) = news_parts(query, raw)?;
    let page_size = u64::from(page_size.max(1));

    let batch = NewsBatch {
        page,
        articles,
        total_pages: total_results.div_ceil(page_size),
    };
    Ok((batch, total_results))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STOCKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct RawQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    quote: Option<HashMap<String, String>>,
}

const PRICE_FIELD: &str = "05. price";
const VOLUME_FIELD: &str = "06. volume";
const CHANGE_FIELD: &str = "09. change";

/// Builds a [`StockQuote`] from a global-quote body.
///
/// An empty or absent quote block means the symbol is unknown.
pub fn stock(symbol: &str, raw: Value) -> Result<StockQuote> {
    let raw: RawQuoteResponse = decode(Resource::Stocks, raw)?;
    let missing = || TributaryError::not_found(Resource::Stocks.name(), symbol);

    let quote = raw.quote.filter(|q| !q.is_empty()).ok_or_else(missing)?;
    let field = |name: &str| {
        quote
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(missing)
    };

    let price = parse_number::<f64>(PRICE_FIELD, field(PRICE_FIELD)?)?;
    let change = parse_number::<f64>(CHANGE_FIELD, field(CHANGE_FIELD)?)?;
    let volume = parse_number::<u64>(VOLUME_FIELD, field(VOLUME_FIELD)?)?;

    Ok(StockQuote {
        symbol: symbol.to_string(),
        price,
        change,
        volume,
        timestamp: Utc::now(),
    })
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        TributaryError::InvalidResponse(format!("field '{}' is not a number: {}", field, value))
    })
}
