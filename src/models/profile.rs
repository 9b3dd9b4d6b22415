//! Profile and balance models.
//!
//! This module defines:
//! - `Profile`: the banking customer
//! - `Balance`: the single spendable balance row per profile
//! - Request/response bodies for sign-up and the dashboard summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{advance::AdvanceResponse, pocket::PocketResponse};

/// Represents a profile record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Profile {
    pub id: Uuid,

    /// Login and notification address (unique)
    pub email: String,

    pub full_name: Option<String>,

    /// Processor sub-account created the first time a card is vaulted
    pub processor_account_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Spendable balance of a profile.
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents. A CHECK constraint keeps
/// `available_cents >= 0`, and every mutation goes through a conditional
/// update in the ledger service.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Balance {
    pub profile_id: Uuid,
    pub available_cents: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a profile.
///
/// # JSON Example
///
/// ```json
/// {
///   "email": "ada@example.com",
///   "full_name": "Ada Lovelace"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub email: String,

    #[serde(default)]
    pub full_name: Option<String>,

    /// Currency of the balance row (defaults to "USD")
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Response for sign-up. The `access_token` is never returned again.
#[derive(Debug, Serialize)]
pub struct CreateProfileResponse {
    pub profile: ProfileResponse,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            created_at: profile.created_at,
        }
    }
}

/// Dashboard summary returned by `GET /api/v1/me`.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub profile: ProfileResponse,
    pub balance_cents: i64,
    pub currency: String,
    pub pockets: Vec<PocketResponse>,

    /// Total held across pockets, not included in `balance_cents`
    pub pockets_total_cents: i64,

    pub outstanding_advance: Option<AdvanceResponse>,
    pub unread_notifications: i64,
}
