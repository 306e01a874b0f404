//! Tributary CLI
//!
//! Runs the API server, or performs a single lookup and prints it as JSON.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use futures::StreamExt;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tributary_api::{ApiConfig, ApiServer, AppState};
use tributary_fetch::HttpUpstream;

/// Tributary - weather, news and stock quotes behind one cached API
#[derive(Parser)]
#[command(name = "tributary")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000", env = "PORT")]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0", env = "BIND_ADDRESS")]
        bind: IpAddr,
    },

    /// Current weather for a location
    Weather {
        location: String,
    },

    /// Latest news for a search query
    News {
        query: String,
        /// Walk the full result set, this many articles per page
        #[arg(long)]
        page_size: Option<u32>,
        /// Stop after this many pages (with --page-size)
        #[arg(long, default_value = "5")]
        max_pages: usize,
    },

    /// Latest quote for a ticker symbol
    Stocks {
        symbol: String,
    },

    /// Weather, news and a quote in one call
    Aggregate {
        location: String,
        news_query: String,
        stock_symbol: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Serve { port, bind } => cmd_serve(bind, port).await,
        Commands::Weather { location } => {
            let state = app_state()?;
            print_json(&state.aggregator.weather(&location).await?)
        }
        Commands::News {
            query,
            page_size: Some(page_size),
            max_pages,
        } => cmd_news_pages(&query, page_size, max_pages).await,
        Commands::News { query, .. } => {
            let state = app_state()?;
            print_json(&state.aggregator.news(&query).await?)
        }
        Commands::Stocks { symbol } => {
            let state = app_state()?;
            print_json(&state.aggregator.stocks(&symbol).await?)
        }
        Commands::Aggregate {
            location,
            news_query,
            stock_symbol,
        } => {
            let state = app_state()?;
            let result = state
                .aggregator
                .fetch_all(&location, &news_query, &stock_symbol)
                .await?;
            eprintln!(
                "{} {:.3}s",
                "Fetched all three in".green(),
                result.execution_time
            );
            print_json(&result)
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "tributary=debug,info"
    } else {
        "tributary=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // stdout carries command output
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn app_state() -> Result<AppState> {
    AppState::new(ApiConfig::from_env()).context("Failed to build upstream clients")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run the API server
async fn cmd_serve(bind: IpAddr, port: u16) -> Result<()> {
    println!("{}", "Starting Tributary API server...".cyan().bold());
    println!("   {} http://{}:{}", "Listening on:".green(), bind, port);
    println!("   {} http://{}:{}/health", "Health check:".dimmed(), bind, port);
    println!("\n   Press Ctrl+C to stop.\n");

    let config = ApiConfig::from_env();
    let server = ApiServer::new(config).context("Failed to build upstream clients")?;

    server
        .run(SocketAddr::new(bind, port))
        .await
        .context("API server failed")?;

    info!("Server stopped");
    Ok(())
}

/// Stream a news search page by page
async fn cmd_news_pages(query: &str, page_size: u32, max_pages: usize) -> Result<()> {
    let config = ApiConfig::from_env();
    let upstream = HttpUpstream::new(config.upstream).context("Failed to build news client")?;

    let mut pages = Box::pin(upstream.news_pages(query, page_size).take(max_pages));
    while let Some(batch) = pages.next().await {
        let batch = batch.with_context(|| format!("Failed to fetch news for '{}'", query))?;
        eprintln!(
            "{} {}/{}",
            "Page".cyan().bold(),
            batch.page,
            batch.total_pages
        );
        print_json(&batch)?;
    }
    Ok(())
}
