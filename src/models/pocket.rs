//! Pocket models.
//!
//! A pocket is a named sub-balance ("Rent", "Holiday") carved out of the
//! main balance. Money only moves between the main balance and a pocket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Pocket {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub balance_cents: i64,

    /// Optional savings target
    pub goal_cents: Option<i64>,

    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/pockets`.
///
/// ```json
/// { "name": "Holiday", "goal_cents": 150000 }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreatePocketRequest {
    pub name: String,

    #[serde(default)]
    pub goal_cents: Option<i64>,
}

/// Request body for pocket deposit/withdraw.
#[derive(Debug, Deserialize)]
pub struct PocketMoveRequest {
    pub amount_cents: i64,

    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PocketResponse {
    pub id: Uuid,
    pub name: String,
    pub balance_cents: i64,
    pub goal_cents: Option<i64>,

    /// Whole-percent progress toward the goal, capped at 100
    pub progress_percent: Option<u8>,

    pub created_at: DateTime<Utc>,
}

impl From<Pocket> for PocketResponse {
    fn from(pocket: Pocket) -> Self {
        let progress_percent = pocket
            .goal_cents
            .filter(|goal| *goal > 0)
            .map(|goal| (pocket.balance_cents.saturating_mul(100) / goal).clamp(0, 100) as u8);

        Self {
            id: pocket.id,
            name: pocket.name,
            balance_cents: pocket.balance_cents,
            goal_cents: pocket.goal_cents,
            progress_percent,
            created_at: pocket.created_at,
        }
    }
}
