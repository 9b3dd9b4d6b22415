//! Notification handlers.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    db::DbPool, error::AppError, middleware::auth::AuthContext,
    models::notification::Notification, services::notification_service,
};

pub async fn list_notifications(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = notification_service::list_notifications(&pool, auth.profile_id).await?;
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification =
        notification_service::mark_read(&pool, auth.profile_id, notification_id).await?;
    Ok(Json(notification))
}
