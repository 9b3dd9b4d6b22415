//! Vaulted payout destinations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tokenized card or bank account attached to the profile's processor
/// sub-account. Raw card data never reaches this service.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PayoutMethod {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub processor_account_id: String,
    pub external_account_id: String,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/payout-methods`.
///
/// ```json
/// { "token": "tok_visa_debit" }
/// ```
#[derive(Debug, Deserialize)]
pub struct VaultCardRequest {
    /// Token produced by the processor's client-side tokenization
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct PayoutMethodResponse {
    pub id: Uuid,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PayoutMethod> for PayoutMethodResponse {
    fn from(method: PayoutMethod) -> Self {
        Self {
            id: method.id,
            brand: method.brand,
            last4: method.last4,
            created_at: method.created_at,
        }
    }
}

/// Request body for `POST /api/v1/withdrawals`.
#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub payout_method_id: Uuid,
    pub amount_cents: i64,

    /// Required so a retried request never pays out twice
    pub idempotency_key: String,
}

/// Request body for both deposit flows.
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub status: String,
}
