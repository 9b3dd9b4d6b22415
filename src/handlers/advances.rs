//! Emergency advance HTTP handlers.
//!
//! - POST /api/v1/advances/assess - Run the risk check only
//! - POST /api/v1/advances - Assess and disburse
//! - GET /api/v1/advances - List advances
//! - POST /api/v1/advances/{id}/repay - Repay an open advance

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    clients::email::{OutgoingEmail, send_best_effort},
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        advance::{AdvanceRequest, AdvanceResponse},
        transaction::format_cents,
    },
    services::{advance_service, risk::RiskReport},
    state::AppState,
};

/// Run the five-stage check without moving money.
///
/// # Response (200)
///
/// ```json
/// {
///   "decision": "approved",
///   "score": 100,
///   "amount_cents": 20000,
///   "stages": [
///     { "stage": "identity", "passed": true, "detail": "Profile identity complete" },
///     ...
///   ]
/// }
/// ```
pub async fn assess_advance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<RiskReport>, AppError> {
    let report = advance_service::assess(
        &state.pool,
        &state.config.advance_policy(),
        auth.profile_id,
        request.amount_cents,
    )
    .await?;

    Ok(Json(report))
}

/// Assess and disburse an advance.
///
/// # Response
///
/// - **201 Created**: New advance, balance credited
/// - **200 OK**: Replay of an earlier request with the same `idempotency_key`
/// - **422**: Declined, `error.details` holds the stage report
/// - **409**: Another advance is still outstanding
pub async fn request_advance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<AdvanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (advance, created) = advance_service::request_advance(
        &state.pool,
        &state.config.advance_policy(),
        auth.profile_id,
        request.amount_cents,
        request.idempotency_key,
    )
    .await?;

    if !created {
        return Ok((StatusCode::OK, Json(AdvanceResponse::from(advance))));
    }

    let email = state.email.clone();
    let receipt = OutgoingEmail {
        to: auth.email,
        subject: "Your emergency advance is on its way".to_string(),
        text: format!(
            "{} has been added to your balance. Repay it any time from the dashboard.",
            format_cents(advance.amount_cents)
        ),
    };
    tokio::spawn(async move { send_best_effort(email.as_ref(), receipt).await });

    Ok((StatusCode::CREATED, Json(AdvanceResponse::from(advance))))
}

pub async fn list_advances(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<AdvanceResponse>>, AppError> {
    let advances = advance_service::list_advances(&pool, auth.profile_id).await?;
    Ok(Json(advances.into_iter().map(Into::into).collect()))
}

/// Debit the advance amount from the balance. Already repaid advances are returned unchanged.
pub async fn repay_advance(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(advance_id): Path<Uuid>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let advance = advance_service::repay(&pool, auth.profile_id, advance_id).await?;
    Ok(Json(advance.into()))
}
