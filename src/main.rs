//! Bank Gateway - Main Application Entry Point
//!
//! REST API backend for a consumer banking app: profiles with a single
//! balance, an append-only ledger, card deposits and withdrawals through a
//! payment processor, emergency advances gated by a risk check, pockets,
//! internal transfers, notifications, and thin AI and email pass-throughs.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: Bearer tokens stored as SHA-256 hashes
//! - **Vendors**: Payment processor, text completion and email over reqwest
//!
//! # Startup Flow
//!
//! 1. Load and check configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build vendor clients and the HTTP router
//! 5. Start server on configured port

mod clients;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_utils;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG, defaults to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    config.check_urls()?;
    config.log_missing_credentials();
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let addr = format!("0.0.0.0:{}", config.server_port);
    let app = routes::build_router(state::AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
