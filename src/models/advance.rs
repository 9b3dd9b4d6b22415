//! Emergency advance models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an advance record from the database.
///
/// # Lifecycle
///
/// `disbursed` when the balance is credited, `repaid` once the
/// outstanding amount has been debited back. A partial unique index allows
/// at most one `disbursed` advance per profile.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Advance {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub amount_cents: i64,
    pub status: String,
    pub idempotency_key: String,
    pub risk_report: serde_json::Value,
    pub disbursement_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub repaid_at: Option<DateTime<Utc>>,
}

pub const STATUS_DISBURSED: &str = "disbursed";
pub const STATUS_REPAID: &str = "repaid";

/// Request body for assessing or requesting an advance.
///
/// ```json
/// { "amount_cents": 20000, "idempotency_key": "advance-2025-03-01" }
/// ```
#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub amount_cents: i64,

    /// Required for disbursement, ignored by assessment
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub id: Uuid,
    pub amount_cents: i64,
    pub status: String,
    pub risk_report: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub repaid_at: Option<DateTime<Utc>>,
}

impl From<Advance> for AdvanceResponse {
    fn from(advance: Advance) -> Self {
        Self {
            id: advance.id,
            amount_cents: advance.amount_cents,
            status: advance.status,
            risk_report: advance.risk_report,
            created_at: advance.created_at,
            repaid_at: advance.repaid_at,
        }
    }
}
