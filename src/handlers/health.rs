//! Liveness and database readiness check.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{db::DbPool, error::AppError};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: DatabaseHealth,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: usize,
}

/// GET /health
///
/// Runs `SELECT 1` through the pool. An unreachable database yields the
/// standard 500 error body, so load balancers take the instance out.
///
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0",
///   "database": { "connected": true, "pool_size": 3, "idle_connections": 2 },
///   "timestamp": "2025-03-01T12:00:00Z"
/// }
/// ```
pub async fn health_check(State(pool): State<DbPool>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database: DatabaseHealth {
            connected: true,
            pool_size: pool.size(),
            idle_connections: pool.num_idle(),
        },
        timestamp: Utc::now(),
    }))
}
