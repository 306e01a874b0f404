//! # Tributary API Server
//!
//! HTTP front end for the aggregator.
//!
//! ## Endpoints
//!
//! - `GET /` - Welcome message
//! - `GET /health` - Liveness probe
//! - `GET /api/weather?location=` - Current weather
//! - `GET /api/news?query=` - Latest articles
//! - `GET /api/stocks?symbol=` - Latest quote
//! - `GET /api/aggregate?location=&news_query=&stock_symbol=` - All three at once
//! - `GET /api/stats` - Cache and rate limiter counters
//!
//! ## Example
//!
//! ```rust,ignore
//! use tributary_api::{ApiServer, ApiConfig};
//!
//! let config = ApiConfig::from_env();
//! let server = ApiServer::new(config)?;
//! server.run(([0, 0, 0, 0], 8000)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use tributary_core::error::Result;

/// API server for Tributary.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a server talking to the configured upstreams.
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self::from_state(AppState::new(config)?))
    }

    /// Wraps an already built application context.
    pub fn from_state(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// The shared application context.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the router with all routes and middleware configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address until Ctrl-C.
    ///
    /// The cache sweeper is started before accepting connections and joined
    /// after the last in-flight request has finished.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        self.state.start();
        info!("Tributary API server listening on {}", addr);

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await;

        self.state.shutdown().await;
        served
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
