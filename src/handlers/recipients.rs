//! Recipient and internal transfer handlers.
//!
//! - POST /api/v1/recipients
//! - GET /api/v1/recipients
//! - DELETE /api/v1/recipients/{id}
//! - POST /api/v1/transfers

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
    models::{
        recipient::{CreateRecipientRequest, RecipientResponse, TransferRequest},
        transaction::TransactionResponse,
    },
    services::recipient_service,
};

pub async fn create_recipient(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateRecipientRequest>,
) -> Result<impl IntoResponse, AppError> {
    let recipient = recipient_service::create_recipient(&pool, auth.profile_id, request).await?;
    Ok((StatusCode::CREATED, Json(RecipientResponse::from(recipient))))
}

pub async fn list_recipients(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<RecipientResponse>>, AppError> {
    let recipients = recipient_service::list_recipients(&pool, auth.profile_id).await?;
    Ok(Json(recipients.into_iter().map(Into::into).collect()))
}

pub async fn delete_recipient(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(recipient_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    recipient_service::delete_recipient(&pool, auth.profile_id, recipient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send money to a saved recipient who also banks here.
///
/// Both balances change in one database transaction; the response is the
/// sender's debit entry.
pub async fn create_transfer(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = recipient_service::send_to_recipient(&pool, auth.profile_id, request).await?;
    Ok(Json(transaction.into()))
}
