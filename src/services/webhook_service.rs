//! Payment webhook verification and ledger reconciliation.
//!
//! This module checks the processor's HMAC signature, records each event
//! id exactly once, and applies the ledger effect in the same database
//! transaction as the record. A replayed or concurrently redelivered event
//! therefore changes balances at most once.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        transaction::{Direction, TransactionKind, format_cents},
        webhook::{LedgerEffect, PaymentEvent},
    },
    services::{
        ledger_service::{self, LedgerEntry},
        notification_service,
    },
};

type HmacSha256 = Hmac<Sha256>;

/// Outcome reported back to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    Ignored,
    Duplicate,
}

impl EventOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            EventOutcome::Applied => "applied",
            EventOutcome::Ignored => "ignored",
            EventOutcome::Duplicate => "duplicate",
        }
    }
}

/// Verify a `Stripe-Signature` style header.
///
/// # Format
///
/// `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`
///
/// The signed payload is `"{t}.{raw body}"`. Any `v1` entry may match
/// (several are sent while a secret is being rolled). Comparison is
/// constant-time via `verify_slice`.
///
/// # Errors
///
/// `InvalidWebhookSignature` when the secret is unset, the header is
/// malformed, the timestamp is outside `tolerance_secs` of `now`, or no
/// signature matches.
pub fn verify_signature(
    header: Option<&str>,
    payload: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), AppError> {
    if secret.is_empty() {
        tracing::error!("Payment webhook secret not configured, rejecting event");
        return Err(AppError::InvalidWebhookSignature);
    }

    let header = header.ok_or(AppError::InvalidWebhookSignature)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidWebhookSignature)?;
    if (now - timestamp).abs() > tolerance_secs {
        tracing::warn!(timestamp, now, "Webhook timestamp outside tolerance");
        return Err(AppError::InvalidWebhookSignature);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InvalidWebhookSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|expected| mac.clone().verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        tracing::warn!("Webhook signature mismatch");
        Err(AppError::InvalidWebhookSignature)
    }
}

/// Compute the header value the processor would send.
#[cfg(test)]
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// Record the event and apply its ledger effect atomically.
///
/// # Process
///
/// 1. Insert event id into `processed_webhook_events` (no-op on duplicate)
/// 2. Duplicate: commit nothing, report `Duplicate`
/// 3. Apply the [`LedgerEffect`] and a notification
/// 4. Commit
///
/// Malformed objects on recognised event types are logged and recorded as
/// ignored, so the processor stops redelivering an event that can never apply.
pub async fn process_event(pool: &DbPool, event: &PaymentEvent) -> Result<EventOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let recorded = sqlx::query(
        r#"
        INSERT INTO processed_webhook_events (event_id, event_type)
        VALUES ($1, $2)
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(&event.id)
    .bind(&event.event_type)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if recorded == 0 {
        tracing::info!(event_id = %event.id, "Duplicate webhook event ignored");
        return Ok(EventOutcome::Duplicate);
    }

    let mut effect = match event.ledger_effect() {
        Ok(effect) => effect,
        Err(reason) => {
            tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                %reason,
                "Unusable webhook event"
            );
            LedgerEffect::Ignore("malformed event object")
        }
    };

    if let LedgerEffect::Deposit {
        profile_id,
        amount_cents,
        ref processor_ref,
        ..
    } = effect
    {
        if !balance_exists(&mut *tx, profile_id).await? {
            // Signed but can never apply; recording it stops redelivery
            tracing::error!(
                event_id = %event.id,
                %profile_id,
                %processor_ref,
                amount_cents,
                "Deposit for unknown profile, not credited"
            );
            effect = LedgerEffect::Ignore("deposit for unknown profile");
        }
    }

    let outcome = match effect {
        LedgerEffect::Deposit {
            profile_id,
            amount_cents,
            currency,
            processor_ref,
        } => {
            let entry = LedgerEntry::new(
                profile_id,
                TransactionKind::Deposit,
                Direction::Credit,
                amount_cents,
            )
            .description("Card deposit")
            .processor_ref(processor_ref.clone())
            .idempotency_key(Some(format!("deposit:{}", processor_ref)))
            .metadata(serde_json::json!({
                "event_id": event.id,
                "processor_currency": currency,
            }));

            let applied = ledger_service::apply_entry(&mut *tx, entry).await?;
            if !applied.is_replay() {
                notification_service::notify(
                    &mut *tx,
                    profile_id,
                    "Deposit received",
                    &format!("{} was added to your balance.", format_cents(amount_cents)),
                )
                .await?;
            }
            EventOutcome::Applied
        }
        LedgerEffect::ReverseWithdrawal {
            processor_ref,
            amount_reversed_cents,
        } => {
            match ledger_service::find_by_processor_ref(&mut *tx, &processor_ref).await? {
                Some(original) => {
                    let refund = ledger_service::reverse_debit_up_to(
                        &mut *tx,
                        original.id,
                        "Withdrawal reversed",
                        amount_reversed_cents,
                    )
                    .await?;
                    if let Some(refund) = refund {
                        notification_service::notify(
                            &mut *tx,
                            original.profile_id,
                            "Withdrawal returned",
                            &format!(
                                "{} was returned to your balance.",
                                format_cents(refund.amount_cents)
                            ),
                        )
                        .await?;
                    }
                    EventOutcome::Applied
                }
                None => {
                    tracing::warn!(%processor_ref, "Reversal for unknown transfer");
                    EventOutcome::Ignored
                }
            }
        }
        LedgerEffect::Ignore(reason) => {
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                reason,
                "Webhook event ignored"
            );
            EventOutcome::Ignored
        }
    };

    tx.commit().await?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        created = ?event.created,
        outcome = outcome.as_str(),
        "Webhook event processed"
    );

    Ok(outcome)
}

async fn balance_exists(conn: &mut PgConnection, profile_id: Uuid) -> Result<bool, AppError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM balances WHERE profile_id = $1)")
            .bind(profile_id)
            .fetch_one(conn)
            .await?;
    Ok(exists)
}
