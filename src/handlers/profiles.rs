//! Profile HTTP handlers.
//!
//! - POST /api/v1/profiles - Sign up (public)
//! - GET /api/v1/me - Dashboard summary

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::profile::{CreateProfileRequest, CreateProfileResponse, DashboardResponse},
    services::profile_service,
};

/// Create a profile.
///
/// # Request Body
///
/// ```json
/// { "email": "ada@example.com", "full_name": "Ada Lovelace" }
/// ```
///
/// # Response (201)
///
/// The profile plus an `access_token`. The token is only shown here; send
/// it as `Authorization: Bearer <token>` on every other endpoint.
pub async fn create_profile(
    State(pool): State<DbPool>,
    Json(request): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (profile, access_token) = profile_service::create_profile(&pool, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateProfileResponse {
            profile: profile.into(),
            access_token,
        }),
    ))
}

/// Balance, pockets, open advance and unread count for the caller.
pub async fn me(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DashboardResponse>, AppError> {
    let dashboard = profile_service::dashboard(&pool, auth.profile_id).await?;
    Ok(Json(dashboard))
}
