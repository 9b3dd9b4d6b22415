//! Pockets: named sub-balances moved to and from the main balance.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, conflict_on_unique},
    models::{
        pocket::{CreatePocketRequest, Pocket},
        transaction::{Direction, TransactionKind},
    },
    services::ledger_service::{self, LedgerEntry},
};

const MAX_POCKET_NAME_LEN: usize = 64;

/// Direction of a pocket move relative to the pocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PocketMove {
    /// Main balance -> pocket
    Deposit,
    /// Pocket -> main balance
    Withdraw,
}

pub async fn create_pocket(
    pool: &DbPool,
    profile_id: Uuid,
    request: CreatePocketRequest,
) -> Result<Pocket, AppError> {
    let name = request.name.trim();
    if name.is_empty() || name.chars().count() > MAX_POCKET_NAME_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Pocket name must be 1-{} characters",
            MAX_POCKET_NAME_LEN
        )));
    }
    if request.goal_cents.is_some_and(|goal| goal <= 0) {
        return Err(AppError::InvalidRequest(
            "goal_cents must be positive".to_string(),
        ));
    }

    sqlx::query_as::<_, Pocket>(
        "INSERT INTO pockets (profile_id, name, goal_cents) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(profile_id)
    .bind(name)
    .bind(request.goal_cents)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "A pocket with this name already exists"))
}

pub async fn list_pockets(pool: &DbPool, profile_id: Uuid) -> Result<Vec<Pocket>, AppError> {
    let pockets = sqlx::query_as::<_, Pocket>(
        "SELECT * FROM pockets WHERE profile_id = $1 ORDER BY created_at",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    Ok(pockets)
}

/// Move money between the main balance and a pocket in one transaction.
///
/// The ledger row records the main balance side; the pocket row is
/// updated with the same conditional-update pattern so neither side can
/// go negative. A replayed idempotency key returns the pocket unchanged.
pub async fn move_funds(
    pool: &DbPool,
    profile_id: Uuid,
    pocket_id: Uuid,
    movement: PocketMove,
    amount_cents: i64,
    idempotency_key: Option<String>,
) -> Result<Pocket, AppError> {
    ledger_service::validate_amount(amount_cents)?;

    let mut tx = pool.begin().await?;

    let pocket = sqlx::query_as::<_, Pocket>(
        "SELECT * FROM pockets WHERE id = $1 AND profile_id = $2 FOR UPDATE",
    )
    .bind(pocket_id)
    .bind(profile_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Pocket"))?;

    let (kind, direction, pocket_delta) = match movement {
        PocketMove::Deposit => (TransactionKind::PocketIn, Direction::Debit, amount_cents),
        PocketMove::Withdraw => (TransactionKind::PocketOut, Direction::Credit, -amount_cents),
    };

    let entry = LedgerEntry::new(profile_id, kind, direction, amount_cents)
        .description(match movement {
            PocketMove::Deposit => format!("Moved to {}", pocket.name),
            PocketMove::Withdraw => format!("Moved from {}", pocket.name),
        })
        .idempotency_key(idempotency_key.map(|k| format!("pocket:{}:{}", pocket.id, k)))
        .metadata(serde_json::json!({ "pocket_id": pocket.id }));

    if ledger_service::apply_entry(&mut *tx, entry).await?.is_replay() {
        return Ok(pocket);
    }

    let updated = sqlx::query_as::<_, Pocket>(
        r#"
        UPDATE pockets
        SET balance_cents = balance_cents + $1
        WHERE id = $2 AND balance_cents + $1 >= 0
        RETURNING *
        "#,
    )
    .bind(pocket_delta)
    .bind(pocket.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::InsufficientBalance)?;

    tx.commit().await?;

    Ok(updated)
}
