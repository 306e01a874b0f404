//! API route handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use tracing::debug;

use tributary_core::types::{AggregatedResult, NewsPage, StockQuote, WeatherReading};

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// GET /
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the Tributary API aggregator".into(),
    })
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: Utc::now(),
    })
}

/// GET /api/weather
pub async fn get_weather(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<WeatherReading>> {
    let reading = state.aggregator.weather(&params.location).await?;
    Ok(Json(reading))
}

/// GET /api/news
pub async fn get_news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NewsQuery>,
) -> Result<Json<NewsPage>> {
    let page = state.aggregator.news(&params.query).await?;
    debug!(articles = page.articles.len(), "Serving news");
    Ok(Json(page))
}

/// GET /api/stocks
pub async fn get_stocks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StocksQuery>,
) -> Result<Json<StockQuote>> {
    let quote = state.aggregator.stocks(&params.symbol).await?;
    Ok(Json(quote))
}

/// GET /api/aggregate
pub async fn get_aggregate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AggregateQuery>,
) -> Result<Json<AggregatedResult>> {
    let result = state
        .aggregator
        .fetch_all(&params.location, &params.news_query, &params.stock_symbol)
        .await?;
    Ok(Json(result))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let admission = state.aggregator.admission();

    Json(StatsResponse {
        cache: state.aggregator.cache_stats(),
        rate_limit: RateLimitStats {
            max_requests: admission.max_requests(),
            window_seconds: admission.window().as_secs(),
            remaining: admission.remaining(),
        },
        upstream_limiters: state.aggregator.upstream_limits().len(),
    })
}
