//! Saved payee models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A payee saved by a profile.
///
/// `linked_profile_id` is filled when the email belongs to another
/// profile of this service; only linked recipients can receive internal
/// transfers.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Recipient {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub email: String,
    pub linked_profile_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipientRequest {
    pub name: String,
    pub email: String,
}

/// Request body for `POST /api/v1/transfers`.
///
/// ```json
/// {
///   "recipient_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount_cents": 2500,
///   "description": "Dinner",
///   "idempotency_key": "dinner-2025-03-01"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub recipient_id: Uuid,
    pub amount_cents: i64,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecipientResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,

    /// Whether internal transfers to this recipient are possible
    pub can_receive_transfers: bool,

    pub created_at: DateTime<Utc>,
}

impl From<Recipient> for RecipientResponse {
    fn from(recipient: Recipient) -> Self {
        Self {
            id: recipient.id,
            name: recipient.name,
            email: recipient.email,
            can_receive_transfers: recipient.linked_profile_id.is_some(),
            created_at: recipient.created_at,
        }
    }
}
