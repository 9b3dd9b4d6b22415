//! Saved recipients and internal transfers to them.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, conflict_on_unique},
    models::{
        recipient::{CreateRecipientRequest, Recipient, TransferRequest},
        transaction::{Transaction, format_cents},
    },
    services::{ledger_service, notification_service, profile_service},
};

/// Save a recipient, linking it to a profile with the same email if one exists.
pub async fn create_recipient(
    pool: &DbPool,
    profile_id: Uuid,
    request: CreateRecipientRequest,
) -> Result<Recipient, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("name is required".to_string()));
    }
    let email = profile_service::normalize_email(&request.email)?;

    let linked_profile_id: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM profiles WHERE email = $1 AND id <> $2")
            .bind(&email)
            .bind(profile_id)
            .fetch_optional(pool)
            .await?;

    sqlx::query_as::<_, Recipient>(
        r#"
        INSERT INTO recipients (profile_id, name, email, linked_profile_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(profile_id)
    .bind(name)
    .bind(&email)
    .bind(linked_profile_id)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "Recipient already saved"))
}

pub async fn list_recipients(pool: &DbPool, profile_id: Uuid) -> Result<Vec<Recipient>, AppError> {
    let recipients = sqlx::query_as::<_, Recipient>(
        "SELECT * FROM recipients WHERE profile_id = $1 ORDER BY name",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    Ok(recipients)
}

pub async fn delete_recipient(
    pool: &DbPool,
    profile_id: Uuid,
    recipient_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM recipients WHERE id = $1 AND profile_id = $2")
        .bind(recipient_id)
        .bind(profile_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Recipient"));
    }

    Ok(())
}

/// Send money to a linked recipient's balance.
///
/// # Errors
///
/// - `NotFound`: Recipient missing or owned by someone else
/// - `InvalidRequest`: Recipient has no account with this service
/// - `InsufficientBalance`: Sender cannot cover the amount
pub async fn send_to_recipient(
    pool: &DbPool,
    sender_profile_id: Uuid,
    request: TransferRequest,
) -> Result<Transaction, AppError> {
    let recipient = sqlx::query_as::<_, Recipient>(
        "SELECT * FROM recipients WHERE id = $1 AND profile_id = $2",
    )
    .bind(request.recipient_id)
    .bind(sender_profile_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Recipient"))?;

    let receiver_profile_id = recipient.linked_profile_id.ok_or_else(|| {
        AppError::InvalidRequest("Recipient cannot receive internal transfers".to_string())
    })?;

    let description = request
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Transfer to {}", recipient.name));

    let applied = ledger_service::transfer_between_profiles(
        pool,
        sender_profile_id,
        receiver_profile_id,
        request.amount_cents,
        Some(description),
        request
            .idempotency_key
            .map(|k| format!("transfer:{}:{}", sender_profile_id, k)),
    )
    .await?;

    if !applied.is_replay() {
        let message = format!("You received {}.", format_cents(request.amount_cents));
        let notified =
            notification_service::notify(pool, receiver_profile_id, "Money received", &message)
                .await;
        if let Err(e) = notified {
            tracing::warn!(error = %e, "Failed to notify transfer receiver");
        }
    }

    Ok(applied.into_inner())
}
