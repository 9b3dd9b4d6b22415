//! Inbound payment processor event models.
//!
//! # Webhook Flow
//!
//! 1. The processor POSTs a signed event to `/webhooks/payments`
//! 2. The signature is verified against the shared signing secret
//! 3. The event id is recorded once; replays are acknowledged without effect
//! 4. Recognised events are turned into a [`LedgerEffect`] and applied
//!
//! # Example
//!
//! ```json
//! {
//!   "id": "evt_1Nq...",
//!   "type": "payment_intent.succeeded",
//!   "created": 1735689600,
//!   "data": {
//!     "object": {
//!       "id": "pi_3Nq...",
//!       "amount_received": 2500,
//!       "currency": "usd",
//!       "metadata": { "profile_id": "550e8400-...", "flow": "intent" }
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clients::payments::{FLOW_CHECKOUT, FLOW_INTENT};

/// Envelope of every processor event.
#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub created: Option<i64>,

    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Ledger change implied by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEffect {
    /// Funds arrived for the profile
    Deposit {
        profile_id: Uuid,
        amount_cents: i64,
        currency: String,
        processor_ref: String,
    },

    /// A withdrawal transfer was pulled back by the processor, in whole or
    /// in part. `amount_reversed_cents` is cumulative across reversals.
    ReverseWithdrawal {
        processor_ref: String,
        amount_reversed_cents: Option<i64>,
    },

    /// Recorded but no ledger change
    Ignore(&'static str),
}

/// Response body acknowledging an event.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    profile_id: Option<String>,
    #[serde(default)]
    flow: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    amount_total: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: String,
    amount_received: i64,
    currency: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct TransferObject {
    id: String,
    #[serde(default)]
    amount_reversed: Option<i64>,
}

impl PaymentEvent {
    /// Decide what the event means for the ledger.
    ///
    /// # Errors
    ///
    /// Returns a message when a recognised event type carries an object
    /// this service cannot interpret (missing amount, bad profile id).
    pub fn ledger_effect(&self) -> Result<LedgerEffect, String> {
        match self.event_type.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSessionObject = self.object()?;
                if session.metadata.flow.as_deref() != Some(FLOW_CHECKOUT) {
                    return Ok(LedgerEffect::Ignore("checkout not created by this service"));
                }
                if session.payment_status.as_deref() != Some("paid") {
                    return Ok(LedgerEffect::Ignore("checkout not paid yet"));
                }
                let amount_cents = session
                    .amount_total
                    .filter(|a| *a > 0)
                    .ok_or("checkout session has no amount_total")?;
                Ok(LedgerEffect::Deposit {
                    profile_id: parse_profile_id(&session.metadata)?,
                    amount_cents,
                    currency: session.currency.unwrap_or_else(|| "usd".to_string()).to_uppercase(),
                    processor_ref: session.id,
                })
            }
            "payment_intent.succeeded" => {
                let intent: PaymentIntentObject = self.object()?;
                // Checkout-created intents are credited by checkout.session.completed
                if intent.metadata.flow.as_deref() != Some(FLOW_INTENT) {
                    return Ok(LedgerEffect::Ignore("intent not created by this service"));
                }
                if intent.amount_received <= 0 {
                    return Err("payment intent has no amount_received".to_string());
                }
                Ok(LedgerEffect::Deposit {
                    profile_id: parse_profile_id(&intent.metadata)?,
                    amount_cents: intent.amount_received,
                    currency: intent.currency.to_uppercase(),
                    processor_ref: intent.id,
                })
            }
            "transfer.reversed" => {
                let transfer: TransferObject = self.object()?;
                Ok(LedgerEffect::ReverseWithdrawal {
                    processor_ref: transfer.id,
                    amount_reversed_cents: transfer.amount_reversed,
                })
            }
            _ => Ok(LedgerEffect::Ignore("unhandled event type")),
        }
    }

    fn object<T: for<'de> Deserialize<'de>>(&self) -> Result<T, String> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| format!("malformed {} object: {}", self.event_type, e))
    }
}

fn parse_profile_id(metadata: &Metadata) -> Result<Uuid, String> {
    metadata
        .profile_id
        .as_deref()
        .ok_or_else(|| "metadata.profile_id missing".to_string())?
        .parse()
        .map_err(|_| "metadata.profile_id is not a UUID".to_string())
}
