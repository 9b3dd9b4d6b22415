//! Ledger history handler.
//!
//! - GET /api/v1/transactions?limit=50&before=2025-01-01T00:00:00Z

use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::transaction::{HistoryQuery, TransactionResponse},
    services::ledger_service,
};

/// List the caller's ledger entries, newest first.
///
/// `limit` is clamped to 1..=200. Pass the `created_at` of the last entry
/// as `before` to fetch the next page.
pub async fn list_transactions(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let transactions =
        ledger_service::list_transactions(&pool, auth.profile_id, query.limit, query.before)
            .await?;

    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}
