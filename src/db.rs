//! Postgres pool setup and schema migrations.

use sqlx::{Pool, Postgres};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Connect eagerly so a bad `DATABASE_URL` fails startup.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Apply pending files from `migrations/`, embedded at compile time.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Pool that never opens a connection until a query runs.
///
/// Router tests use it for requests that are rejected before touching the database.
#[cfg(test)]
pub fn lazy_pool() -> DbPool {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy("postgres://localhost/bank_gateway_test")
        .expect("lazy pool url parses")
}
