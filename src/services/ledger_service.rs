//! Ledger service - the balance-mutation procedures.
//!
//! This service handles:
//! - Atomic balance updates
//! - Idempotency checking
//! - Balance validation
//! - Settlement and reversal of pending entries
//!
//! # Atomicity Guarantees
//!
//! A balance never changes without a ledger row and vice versa: both are
//! written inside the same PostgreSQL transaction. Debits are a single
//! conditional `UPDATE` so two concurrent requests can never both spend the
//! same cents, and the `CHECK (available_cents >= 0)` constraint backs it up.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::transaction::{Direction, Transaction, TransactionKind, TransactionStatus},
};

/// One balance movement to record.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub profile_id: Uuid,
    pub kind: TransactionKind,
    pub direction: Direction,
    pub amount_cents: i64,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
    pub processor_ref: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl LedgerEntry {
    /// Completed entry with no key, reference or metadata.
    pub fn new(
        profile_id: Uuid,
        kind: TransactionKind,
        direction: Direction,
        amount_cents: i64,
    ) -> Self {
        Self {
            profile_id,
            kind,
            direction,
            amount_cents,
            status: TransactionStatus::Completed,
            description: None,
            idempotency_key: None,
            processor_ref: None,
            metadata: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn processor_ref(mut self, processor_ref: impl Into<String>) -> Self {
        self.processor_ref = Some(processor_ref.into());
        self
    }

    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Result of applying an entry.
#[derive(Debug, Clone)]
pub enum Applied {
    /// Balance changed and a new row was written
    New(Transaction),

    /// The idempotency key was seen before; nothing changed
    Replayed(Transaction),
}

impl Applied {
    pub fn into_inner(self) -> Transaction {
        match self {
            Applied::New(t) | Applied::Replayed(t) => t,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Applied::Replayed(_))
    }
}

/// Reject amounts the ledger cannot record.
pub fn validate_amount(amount_cents: i64) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Apply one entry inside the caller's database transaction.
///
/// # Process
///
/// 1. Insert the ledger row; a duplicate idempotency key inserts nothing
/// 2. On duplicate, return the existing row untouched
/// 3. Otherwise apply the signed amount with a conditional update
///
/// The caller must roll back (or drop) its transaction on error, which
/// also discards the inserted row.
///
/// # Errors
///
/// - `InvalidRequest`: Amount is zero or negative
/// - `Conflict`: Idempotency key already used by another profile
/// - `NotFound`: Profile has no balance row
/// - `InsufficientBalance`: Debit would take the balance below zero
pub async fn apply_entry(conn: &mut PgConnection, entry: LedgerEntry) -> Result<Applied, AppError> {
    validate_amount(entry.amount_cents)?;

    let inserted = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            profile_id,
            kind,
            direction,
            amount_cents,
            currency,
            status,
            description,
            idempotency_key,
            processor_ref,
            metadata
        )
        VALUES (
            $1, $2, $3, $4,
            COALESCE((SELECT currency FROM balances WHERE profile_id = $1), 'USD'),
            $5, $6, $7, $8, $9
        )
        ON CONFLICT (idempotency_key) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(entry.profile_id)
    .bind(entry.kind.as_str())
    .bind(entry.direction.as_str())
    .bind(entry.amount_cents)
    .bind(entry.status.as_str())
    .bind(&entry.description)
    .bind(&entry.idempotency_key)
    .bind(&entry.processor_ref)
    .bind(&entry.metadata)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(transaction) = inserted else {
        // Only a non-null key can conflict
        let existing = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE idempotency_key = $1",
        )
        .bind(&entry.idempotency_key)
        .fetch_one(&mut *conn)
        .await?;

        if existing.profile_id != entry.profile_id {
            return Err(AppError::Conflict(
                "Idempotency key already used".to_string(),
            ));
        }

        tracing::info!(
            transaction_id = %existing.id,
            key = ?entry.idempotency_key,
            "Idempotent replay, balance unchanged"
        );
        return Ok(Applied::Replayed(existing));
    };

    let delta = entry.direction.signed(entry.amount_cents);
    let new_balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE balances
        SET available_cents = available_cents + $1,
            updated_at = NOW()
        WHERE profile_id = $2
          AND available_cents + $1 >= 0
        RETURNING available_cents
        "#,
    )
    .bind(delta)
    .bind(entry.profile_id)
    .fetch_optional(&mut *conn)
    .await?;

    if new_balance.is_none() {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM balances WHERE profile_id = $1)")
                .bind(entry.profile_id)
                .fetch_one(&mut *conn)
                .await?;

        return Err(if exists {
            AppError::InsufficientBalance
        } else {
            AppError::NotFound("Balance")
        });
    }

    tracing::debug!(
        transaction_id = %transaction.id,
        kind = entry.kind.as_str(),
        delta,
        "Ledger entry applied"
    );

    Ok(Applied::New(transaction))
}

/// Apply a single entry in its own database transaction.
pub async fn apply(pool: &DbPool, entry: LedgerEntry) -> Result<Applied, AppError> {
    let mut tx = pool.begin().await?;
    let applied = apply_entry(&mut *tx, entry).await?;
    tx.commit().await?;
    Ok(applied)
}

/// Move money between two profiles' balances.
///
/// Both balance rows are locked in id order first so that two opposite
/// transfers cannot deadlock. The receiving entry's key is the sender's key
/// under a `transfer-in:` prefix no sender key carries, so a replay returns
/// the original debit.
pub async fn transfer_between_profiles(
    pool: &DbPool,
    from_profile_id: Uuid,
    to_profile_id: Uuid,
    amount_cents: i64,
    description: Option<String>,
    idempotency_key: Option<String>,
) -> Result<Applied, AppError> {
    validate_amount(amount_cents)?;

    if from_profile_id == to_profile_id {
        return Err(AppError::InvalidRequest(
            "Cannot transfer to yourself".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let locked: Vec<Uuid> = sqlx::query_scalar(
        "SELECT profile_id FROM balances WHERE profile_id = ANY($1) ORDER BY profile_id FOR UPDATE",
    )
    .bind(vec![from_profile_id, to_profile_id])
    .fetch_all(&mut *tx)
    .await?;

    if locked.len() != 2 {
        return Err(AppError::NotFound("Balance"));
    }

    let mut debit = LedgerEntry::new(
        from_profile_id,
        TransactionKind::TransferOut,
        Direction::Debit,
        amount_cents,
    )
    .idempotency_key(idempotency_key.clone())
    .metadata(serde_json::json!({ "counterparty_profile_id": to_profile_id }));
    debit.description = description.clone();

    let sent = apply_entry(&mut *tx, debit).await?;
    if sent.is_replay() {
        return Ok(sent);
    }

    let mut credit = LedgerEntry::new(
        to_profile_id,
        TransactionKind::TransferIn,
        Direction::Credit,
        amount_cents,
    )
    .idempotency_key(idempotency_key.map(|key| format!("transfer-in:{}", key)))
    .metadata(serde_json::json!({ "counterparty_profile_id": from_profile_id }));
    credit.description = description;

    apply_entry(&mut *tx, credit).await?;

    // Commit both sides atomically
    tx.commit().await?;

    Ok(sent)
}

/// Mark a pending entry completed, recording the processor reference.
///
/// Returns `None` when the entry is no longer pending (another request
/// settled or reversed it first).
pub async fn mark_settled(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    processor_ref: &str,
) -> Result<Option<Transaction>, AppError> {
    let settled = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $3, processor_ref = $2
        WHERE id = $1 AND status = $4
        RETURNING *
        "#,
    )
    .bind(transaction_id)
    .bind(processor_ref)
    .bind(TransactionStatus::Completed.as_str())
    .bind(TransactionStatus::Pending.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(settled)
}

/// Undo a whole debit: credit the amount back and mark it failed.
///
/// Returns `None` when it was already reversed, so repeated failure
/// signals (request error and later webhook) refund only once.
pub async fn reverse_debit(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    reason: &str,
) -> Result<Option<Transaction>, AppError> {
    reverse_debit_up_to(conn, transaction_id, reason, None).await
}

/// Credit back a debit until `reversed_total` cents of it have been
/// returned in all (the whole amount when `None`).
///
/// `reversed_total` is cumulative, as processors report it, so each call
/// credits only the difference from earlier reversals. The original is
/// marked failed once fully reversed. Returns the new reversal entry, or
/// `None` when nothing was left to credit.
pub async fn reverse_debit_up_to(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    reason: &str,
    reversed_total: Option<i64>,
) -> Result<Option<Transaction>, AppError> {
    let original = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 AND direction = $2 FOR UPDATE",
    )
    .bind(transaction_id)
    .bind(Direction::Debit.as_str())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Debit"))?;

    let target = reversed_total
        .unwrap_or(original.amount_cents)
        .clamp(0, original.amount_cents);

    let already_reversed: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM transactions
        WHERE profile_id = $1
          AND kind = $2
          AND metadata->>'reverses' = $3
        "#,
    )
    .bind(original.profile_id)
    .bind(TransactionKind::Reversal.as_str())
    .bind(original.id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    let remaining = target - already_reversed;
    if remaining <= 0 {
        return Ok(None);
    }

    let refund = LedgerEntry::new(
        original.profile_id,
        TransactionKind::Reversal,
        Direction::Credit,
        remaining,
    )
    .description(reason)
    .idempotency_key(Some(format!("reversal:{}:{}", original.id, target)))
    .metadata(serde_json::json!({ "reverses": original.id }));

    let refunded = apply_entry(&mut *conn, refund).await?.into_inner();

    if target == original.amount_cents {
        sqlx::query("UPDATE transactions SET status = $2 WHERE id = $1")
            .bind(original.id)
            .bind(TransactionStatus::Failed.as_str())
            .execute(&mut *conn)
            .await?;
    }

    tracing::warn!(
        transaction_id = %original.id,
        reversal_id = %refunded.id,
        amount_cents = remaining,
        reason,
        "Debit reversed"
    );

    Ok(Some(refunded))
}

/// Lock and return the entry carrying a processor reference.
pub async fn find_by_processor_ref(
    conn: &mut PgConnection,
    processor_ref: &str,
) -> Result<Option<Transaction>, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE processor_ref = $1 AND direction = 'debit' FOR UPDATE",
    )
    .bind(processor_ref)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(transaction)
}

/// Ledger history for a profile, newest first.
pub async fn list_transactions(
    pool: &DbPool,
    profile_id: Uuid,
    limit: i64,
    before: Option<DateTime<Utc>>,
) -> Result<Vec<Transaction>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE profile_id = $1
          AND ($2::timestamptz IS NULL OR created_at < $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(profile_id)
    .bind(before)
    .bind(limit.clamp(1, 200))
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}

/// Sum of completed incoming funds since `since`.
pub async fn income_since(
    pool: &DbPool,
    profile_id: Uuid,
    since: DateTime<Utc>,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM transactions
        WHERE profile_id = $1
          AND direction = 'credit'
          AND status = 'completed'
          AND kind IN ('deposit', 'transfer_in')
          AND created_at >= $2
        "#,
    )
    .bind(profile_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(total)
}
