//! Ledger entry models and API request/response types.
//!
//! This module defines:
//! - `Transaction`: one row of the per-profile ledger
//! - `TransactionKind`, `Direction`, `TransactionStatus`: the closed value sets stored as text
//! - `HistoryQuery` and `TransactionResponse` for the history endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a ledger entry from the database.
///
/// # Database Table
///
/// Maps to the `transactions` table. Each entry:
/// - Belongs to exactly one profile
/// - Moves a positive amount in one direction (credit or debit)
/// - Carries an optional idempotency key, unique across the table
/// - Stores the processor's object id when money left or entered through the processor
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub profile_id: Uuid,

    /// See [`TransactionKind`]
    pub kind: String,

    /// "credit" or "debit"
    pub direction: String,

    /// Amount in cents, always positive (enforced by CHECK constraint)
    pub amount_cents: i64,

    pub currency: String,

    /// "pending", "completed" or "failed"
    pub status: String,

    pub description: Option<String>,

    /// Replaying a request with the same key returns this row instead of moving money twice
    pub idempotency_key: Option<String>,

    /// Processor transfer / session / intent id
    pub processor_ref: Option<String>,

    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Advance,
    AdvanceRepayment,
    TransferIn,
    TransferOut,
    PocketIn,
    PocketOut,
    Reversal,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Advance => "advance",
            TransactionKind::AdvanceRepayment => "advance_repayment",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::PocketIn => "pocket_in",
            TransactionKind::PocketOut => "pocket_out",
            TransactionKind::Reversal => "reversal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }

    /// Signed effect of `amount_cents` on the balance.
    pub fn signed(self, amount_cents: i64) -> i64 {
        match self {
            Direction::Credit => amount_cents,
            Direction::Debit => -amount_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

/// Query string for `GET /api/v1/transactions`.
///
/// `before` pages backwards through history by creation time.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,

    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
}

fn default_limit() -> i64 {
    50
}

/// Response returned for ledger entries.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "kind": "advance",
///   "direction": "credit",
///   "amount_cents": 25000,
///   "currency": "USD",
///   "status": "completed",
///   "description": "Emergency advance",
///   "created_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub kind: String,
    pub direction: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Drops internal fields (idempotency key, processor reference, metadata).
impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            kind: transaction.kind,
            direction: transaction.direction,
            amount_cents: transaction.amount_cents,
            currency: transaction.currency,
            status: transaction.status,
            description: transaction.description,
            created_at: transaction.created_at,
        }
    }
}

/// `12345` -> `"$123.45"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
