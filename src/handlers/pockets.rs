//! Pocket handlers.
//!
//! - POST /api/v1/pockets
//! - GET /api/v1/pockets
//! - POST /api/v1/pockets/{id}/deposit
//! - POST /api/v1/pockets/{id}/withdraw

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::pocket::{CreatePocketRequest, PocketMoveRequest, PocketResponse},
    services::pocket_service::{self, PocketMove},
};

pub async fn create_pocket(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePocketRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pocket = pocket_service::create_pocket(&pool, auth.profile_id, request).await?;
    Ok((StatusCode::CREATED, Json(PocketResponse::from(pocket))))
}

pub async fn list_pockets(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PocketResponse>>, AppError> {
    let pockets = pocket_service::list_pockets(&pool, auth.profile_id).await?;
    Ok(Json(pockets.into_iter().map(Into::into).collect()))
}

/// Move money from the main balance into the pocket.
pub async fn deposit_to_pocket(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(pocket_id): Path<Uuid>,
    Json(request): Json<PocketMoveRequest>,
) -> Result<Json<PocketResponse>, AppError> {
    let pocket = pocket_service::move_funds(
        &pool,
        auth.profile_id,
        pocket_id,
        PocketMove::Deposit,
        request.amount_cents,
        request.idempotency_key,
    )
    .await?;

    Ok(Json(pocket.into()))
}

/// Move money from the pocket back to the main balance.
pub async fn withdraw_from_pocket(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(pocket_id): Path<Uuid>,
    Json(request): Json<PocketMoveRequest>,
) -> Result<Json<PocketResponse>, AppError> {
    let pocket = pocket_service::move_funds(
        &pool,
        auth.profile_id,
        pocket_id,
        PocketMove::Withdraw,
        request.amount_cents,
        request.idempotency_key,
    )
    .await?;

    Ok(Json(pocket.into()))
}
