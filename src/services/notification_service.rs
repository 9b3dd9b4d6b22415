//! In-app notifications.

use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::notification::Notification};

/// Insert a notification using any executor, so ledger changes can notify
/// inside their own database transaction.
pub async fn notify<'e, E>(
    executor: E,
    profile_id: Uuid,
    title: &str,
    body: &str,
) -> Result<(), AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query("INSERT INTO notifications (profile_id, title, body) VALUES ($1, $2, $3)")
        .bind(profile_id)
        .bind(title)
        .bind(body)
        .execute(executor)
        .await?;

    Ok(())
}

/// Unread first, then newest first.
pub async fn list_notifications(
    pool: &DbPool,
    profile_id: Uuid,
) -> Result<Vec<Notification>, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE profile_id = $1
        ORDER BY is_read ASC, created_at DESC
        LIMIT 100
        "#,
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

pub async fn mark_read(
    pool: &DbPool,
    profile_id: Uuid,
    notification_id: Uuid,
) -> Result<Notification, AppError> {
    sqlx::query_as::<_, Notification>(
        "UPDATE notifications SET is_read = true WHERE id = $1 AND profile_id = $2 RETURNING *",
    )
    .bind(notification_id)
    .bind(profile_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Notification"))
}

pub async fn unread_count(pool: &DbPool, profile_id: Uuid) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE profile_id = $1 AND is_read = false",
    )
    .bind(profile_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
