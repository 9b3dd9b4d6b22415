//! Emergency advance disbursement and repayment.
//!
//! # Disbursement Process
//!
//! 1. Replay check on the client's idempotency key
//! 2. Gather risk inputs and run the five-stage check
//! 3. In one database transaction: insert the advance, credit the balance,
//!    link the ledger row, notify
//!
//! The partial unique index `idx_advances_one_open` is the final guard
//! against two concurrent requests both opening an advance.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        advance::{Advance, STATUS_DISBURSED, STATUS_REPAID},
        profile::Profile,
        transaction::{Direction, TransactionKind, format_cents},
    },
    services::{
        ledger_service::{self, LedgerEntry},
        notification_service, profile_service,
        risk::{self, AdvancePolicy, RiskInputs, RiskReport},
    },
};

const ONE_OPEN_ADVANCE_INDEX: &str = "idx_advances_one_open";

/// Run the risk check without moving money.
pub async fn assess(
    pool: &DbPool,
    policy: &AdvancePolicy,
    profile_id: Uuid,
    amount_cents: i64,
) -> Result<RiskReport, AppError> {
    let profile = profile_service::get_profile(pool, profile_id).await?;
    let inputs = gather_inputs(pool, &profile, amount_cents).await?;
    Ok(risk::assess(&inputs, policy, Utc::now()))
}

async fn gather_inputs(
    pool: &DbPool,
    profile: &Profile,
    amount_cents: i64,
) -> Result<RiskInputs, AppError> {
    let now = Utc::now();
    let credits_last_90_days_cents =
        ledger_service::income_since(pool, profile.id, risk::income_window_start(now)).await?;

    let outstanding_advances: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM advances WHERE profile_id = $1 AND status = $2",
    )
    .bind(profile.id)
    .bind(STATUS_DISBURSED)
    .fetch_one(pool)
    .await?;

    Ok(RiskInputs {
        amount_cents,
        has_email: !profile.email.is_empty(),
        has_full_name: profile.full_name.as_deref().is_some_and(|n| !n.is_empty()),
        profile_created_at: profile.created_at,
        credits_last_90_days_cents,
        outstanding_advances,
    })
}

async fn find_by_key(pool: &DbPool, key: &str) -> Result<Option<Advance>, AppError> {
    let advance = sqlx::query_as::<_, Advance>("SELECT * FROM advances WHERE idempotency_key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(advance)
}

/// Assess and, when approved, disburse an advance.
///
/// Returns the advance and whether this call created it (`false` on replay).
///
/// # Errors
///
/// - `InvalidRequest`: Missing idempotency key
/// - `AdvanceDeclined`: At least one stage failed (report attached)
/// - `AdvanceOutstanding`: A concurrent request opened an advance first
pub async fn request_advance(
    pool: &DbPool,
    policy: &AdvancePolicy,
    profile_id: Uuid,
    amount_cents: i64,
    idempotency_key: Option<String>,
) -> Result<(Advance, bool), AppError> {
    let client_key = idempotency_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("idempotency_key is required".to_string()))?;
    let key = format!("{}:{}", profile_id, client_key);

    if let Some(existing) = find_by_key(pool, &key).await? {
        return Ok((existing, false));
    }

    let report = assess(pool, policy, profile_id, amount_cents).await?;
    if !report.approved() {
        tracing::info!(%profile_id, score = report.score, "Advance declined");
        return Err(AppError::AdvanceDeclined(Box::new(report)));
    }

    let report_json = serde_json::to_value(&report)
        .map_err(|e| AppError::Internal(format!("Failed to encode risk report: {}", e)))?;

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_as::<_, Advance>(
        r#"
        INSERT INTO advances (profile_id, amount_cents, status, idempotency_key, risk_report)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(profile_id)
    .bind(amount_cents)
    .bind(STATUS_DISBURSED)
    .bind(&key)
    .bind(&report_json)
    .fetch_one(&mut *tx)
    .await;

    let advance = match inserted {
        Ok(advance) => advance,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            drop(tx);
            if db.constraint() == Some(ONE_OPEN_ADVANCE_INDEX) {
                return Err(AppError::AdvanceOutstanding);
            }
            // Same key raced us; hand back the winner
            let existing = find_by_key(pool, &key)
                .await?
                .ok_or(AppError::NotFound("Advance"))?;
            return Ok((existing, false));
        }
        Err(e) => return Err(e.into()),
    };

    let credit = LedgerEntry::new(
        profile_id,
        TransactionKind::Advance,
        Direction::Credit,
        amount_cents,
    )
    .description("Emergency advance")
    .idempotency_key(Some(format!("advance:{}", advance.id)))
    .metadata(serde_json::json!({ "advance_id": advance.id }));
    let transaction = ledger_service::apply_entry(&mut *tx, credit).await?.into_inner();

    let advance = sqlx::query_as::<_, Advance>(
        "UPDATE advances SET disbursement_transaction_id = $1 WHERE id = $2 RETURNING *",
    )
    .bind(transaction.id)
    .bind(advance.id)
    .fetch_one(&mut *tx)
    .await?;

    notification_service::notify(
        &mut *tx,
        profile_id,
        "Advance disbursed",
        &format!(
            "{} has been added to your balance.",
            format_cents(amount_cents)
        ),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        %profile_id,
        advance_id = %advance.id,
        amount_cents,
        "Advance disbursed"
    );

    Ok((advance, true))
}

/// Debit the outstanding amount and close the advance.
///
/// Repaying an already repaid advance returns it unchanged.
pub async fn repay(pool: &DbPool, profile_id: Uuid, advance_id: Uuid) -> Result<Advance, AppError> {
    let mut tx = pool.begin().await?;

    let advance = sqlx::query_as::<_, Advance>(
        "SELECT * FROM advances WHERE id = $1 AND profile_id = $2 FOR UPDATE",
    )
    .bind(advance_id)
    .bind(profile_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Advance"))?;

    if advance.status == STATUS_REPAID {
        return Ok(advance);
    }

    let debit = LedgerEntry::new(
        profile_id,
        TransactionKind::AdvanceRepayment,
        Direction::Debit,
        advance.amount_cents,
    )
    .description("Emergency advance repayment")
    .idempotency_key(Some(format!("advance-repayment:{}", advance.id)))
    .metadata(serde_json::json!({ "advance_id": advance.id }));
    ledger_service::apply_entry(&mut *tx, debit).await?;

    let advance = sqlx::query_as::<_, Advance>(
        "UPDATE advances SET status = $1, repaid_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(STATUS_REPAID)
    .bind(advance.id)
    .fetch_one(&mut *tx)
    .await?;

    notification_service::notify(
        &mut *tx,
        profile_id,
        "Advance repaid",
        &format!("{} advance repaid. Thank you!", format_cents(advance.amount_cents)),
    )
    .await?;

    tx.commit().await?;

    Ok(advance)
}

pub async fn list_advances(pool: &DbPool, profile_id: Uuid) -> Result<Vec<Advance>, AppError> {
    let advances = sqlx::query_as::<_, Advance>(
        "SELECT * FROM advances WHERE profile_id = $1 ORDER BY created_at DESC",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    Ok(advances)
}
