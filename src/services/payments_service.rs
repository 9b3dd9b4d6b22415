//! Money in and out through the payment processor.
//!
//! Deposits only create hosted checkout sessions or payment intents; the
//! balance is credited later by the webhook. Withdrawals reserve funds
//! with a pending ledger debit before calling the processor, and reverse
//! the debit if the processor call fails.

use uuid::Uuid;

use crate::{
    clients::payments::{CheckoutRequest, PaymentProcessor, TransferRequest},
    config::Config,
    db::DbPool,
    error::{AppError, conflict_on_unique},
    models::{
        payout_method::{CheckoutResponse, PaymentIntentResponse, PayoutMethod},
        transaction::{Direction, Transaction, TransactionKind, TransactionStatus, format_cents},
    },
    services::{
        ledger_service::{self, Applied, LedgerEntry, validate_amount},
        notification_service, profile_service,
    },
};

/// Upper bound on a single deposit, matching the processor's default card limit.
pub const MAX_DEPOSIT_CENTS: i64 = 99_999_999;

fn validate_deposit(amount_cents: i64) -> Result<(), AppError> {
    validate_amount(amount_cents)?;
    // Card processors refuse charges below 50 cents
    if !(50..=MAX_DEPOSIT_CENTS).contains(&amount_cents) {
        return Err(AppError::InvalidRequest(format!(
            "Deposit must be between {} and {}",
            format_cents(50),
            format_cents(MAX_DEPOSIT_CENTS)
        )));
    }
    Ok(())
}

pub async fn create_checkout(
    pool: &DbPool,
    payments: &dyn PaymentProcessor,
    config: &Config,
    profile_id: Uuid,
    amount_cents: i64,
) -> Result<CheckoutResponse, AppError> {
    validate_deposit(amount_cents)?;
    let profile = profile_service::get_profile(pool, profile_id).await?;
    let balance = profile_service::get_balance(pool, profile_id).await?;

    let session = payments
        .create_checkout_session(&CheckoutRequest {
            profile_id,
            email: profile.email,
            amount_cents,
            currency: balance.currency,
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
        })
        .await
        .map_err(AppError::Payments)?;

    tracing::info!(%profile_id, session_id = %session.id, amount_cents, "Checkout session created");

    Ok(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    })
}

pub async fn create_payment_intent(
    pool: &DbPool,
    payments: &dyn PaymentProcessor,
    profile_id: Uuid,
    amount_cents: i64,
) -> Result<PaymentIntentResponse, AppError> {
    validate_deposit(amount_cents)?;
    let balance = profile_service::get_balance(pool, profile_id).await?;

    let intent = payments
        .create_payment_intent(profile_id, amount_cents, &balance.currency)
        .await
        .map_err(AppError::Payments)?;

    tracing::info!(%profile_id, intent_id = %intent.id, amount_cents, "Payment intent created");

    Ok(PaymentIntentResponse {
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
        status: intent.status,
    })
}

/// Attach a tokenized card to the profile's processor sub-account.
///
/// # Process
///
/// 1. Create the sub-account on first use and persist its id
/// 2. Attach the token as an external account
/// 3. Store brand and last four digits for display
pub async fn vault_card(
    pool: &DbPool,
    payments: &dyn PaymentProcessor,
    profile_id: Uuid,
    token: &str,
) -> Result<PayoutMethod, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::InvalidRequest("token is required".to_string()));
    }

    let profile = profile_service::get_profile(pool, profile_id).await?;

    let account_id = match profile.processor_account_id {
        Some(id) => id,
        None => {
            let account = payments
                .create_connected_account(profile_id, &profile.email)
                .await
                .map_err(AppError::Payments)?;

            // Another request may have created one meanwhile; keep the first
            let stored: String = sqlx::query_scalar(
                r#"
                UPDATE profiles
                SET processor_account_id = COALESCE(processor_account_id, $1)
                WHERE id = $2
                RETURNING processor_account_id
                "#,
            )
            .bind(&account.id)
            .bind(profile_id)
            .fetch_one(pool)
            .await?;

            tracing::info!(%profile_id, account_id = %stored, "Processor sub-account linked");
            stored
        }
    };

    let external = payments
        .attach_external_account(&account_id, token)
        .await
        .map_err(AppError::Payments)?;

    let brand = external.brand.or(external.bank_name);
    let method = sqlx::query_as::<_, PayoutMethod>(
        r#"
        INSERT INTO payout_methods (profile_id, processor_account_id, external_account_id, brand, last4)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(profile_id)
    .bind(&account_id)
    .bind(&external.id)
    .bind(&brand)
    .bind(&external.last4)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "Payout method already saved"))?;

    Ok(method)
}

pub async fn list_payout_methods(
    pool: &DbPool,
    profile_id: Uuid,
) -> Result<Vec<PayoutMethod>, AppError> {
    let methods = sqlx::query_as::<_, PayoutMethod>(
        "SELECT * FROM payout_methods WHERE profile_id = $1 ORDER BY created_at DESC",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    Ok(methods)
}

/// Pay out part of the balance to a vaulted payout method.
///
/// # Process
///
/// 1. Reserve funds with a pending debit (idempotent on the client key)
/// 2. Ask the processor for a transfer, passing the same key upstream
/// 3. Success: mark the debit completed with the transfer id
/// 4. Definitive rejection: reverse the debit, notify, return the error
/// 5. Unknown outcome (timeout, 5xx, undecodable reply): keep the debit
///    pending and return the error; the funds stay reserved
///
/// Retrying with the same key while the debit is still pending sends the
/// transfer again under the same upstream key, which the processor
/// deduplicates, and then settles or reverses it. A retry of a finished
/// withdrawal returns the stored entry as [`Applied::Replayed`] without
/// calling the processor.
pub async fn withdraw(
    pool: &DbPool,
    payments: &dyn PaymentProcessor,
    min_withdrawal_cents: i64,
    profile_id: Uuid,
    payout_method_id: Uuid,
    amount_cents: i64,
    idempotency_key: &str,
) -> Result<Applied, AppError> {
    validate_amount(amount_cents)?;
    if amount_cents < min_withdrawal_cents {
        return Err(AppError::InvalidRequest(format!(
            "Minimum withdrawal is {}",
            format_cents(min_withdrawal_cents)
        )));
    }
    if idempotency_key.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "idempotency_key is required".to_string(),
        ));
    }

    let method = sqlx::query_as::<_, PayoutMethod>(
        "SELECT * FROM payout_methods WHERE id = $1 AND profile_id = $2",
    )
    .bind(payout_method_id)
    .bind(profile_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Payout method"))?;

    let key = format!("withdrawal:{}:{}", profile_id, idempotency_key);
    let label = match (&method.brand, &method.last4) {
        (Some(brand), Some(last4)) => format!("Withdrawal to {} {}", brand, last4),
        _ => "Withdrawal".to_string(),
    };

    let entry = LedgerEntry::new(
        profile_id,
        TransactionKind::Withdrawal,
        Direction::Debit,
        amount_cents,
    )
    .status(TransactionStatus::Pending)
    .description(label)
    .idempotency_key(Some(key.clone()))
    .metadata(serde_json::json!({ "payout_method_id": method.id }));

    let reserved = match ledger_service::apply(pool, entry).await? {
        Applied::Replayed(existing)
            if existing.status != TransactionStatus::Pending.as_str() =>
        {
            return Ok(Applied::Replayed(existing));
        }
        Applied::Replayed(pending) => {
            tracing::info!(
                %profile_id,
                transaction_id = %pending.id,
                "Retrying transfer for pending withdrawal"
            );
            pending
        }
        Applied::New(transaction) => transaction,
    };

    let transfer = payments
        .create_transfer(&TransferRequest {
            profile_id,
            destination: method.processor_account_id.clone(),
            amount_cents: reserved.amount_cents,
            currency: reserved.currency.clone(),
            idempotency_key: key,
        })
        .await;

    match transfer {
        Ok(transfer) => {
            let mut tx = pool.begin().await?;
            let Some(settled) =
                ledger_service::mark_settled(&mut *tx, reserved.id, &transfer.id).await?
            else {
                // A concurrent retry settled or reversed it first
                drop(tx);
                let current = find_transaction(pool, reserved.id).await?;
                return Ok(Applied::Replayed(current));
            };
            notification_service::notify(
                &mut *tx,
                profile_id,
                "Withdrawal sent",
                &format!("{} is on its way.", format_cents(settled.amount_cents)),
            )
            .await?;
            tx.commit().await?;

            tracing::info!(
                %profile_id,
                transaction_id = %settled.id,
                transfer_id = %transfer.id,
                "Withdrawal completed"
            );
            Ok(Applied::New(settled))
        }
        Err(e) if e.is_definitive_rejection() => {
            tracing::error!(
                %profile_id,
                transaction_id = %reserved.id,
                error = %e,
                "Withdrawal transfer rejected, reversing"
            );

            let mut tx = pool.begin().await?;
            let refund =
                ledger_service::reverse_debit(&mut *tx, reserved.id, "Withdrawal failed").await?;
            if refund.is_some() {
                notification_service::notify(
                    &mut *tx,
                    profile_id,
                    "Withdrawal failed",
                    &format!(
                        "We could not send {}. The funds are back in your balance.",
                        format_cents(reserved.amount_cents)
                    ),
                )
                .await?;
            }
            tx.commit().await?;

            Err(AppError::Payments(e))
        }
        Err(e) => {
            tracing::error!(
                %profile_id,
                transaction_id = %reserved.id,
                transient = e.is_transient(),
                error = %e,
                "Withdrawal transfer outcome unknown, funds stay reserved"
            );
            Err(AppError::Payments(e))
        }
    }
}

async fn find_transaction(pool: &DbPool, transaction_id: Uuid) -> Result<Transaction, AppError> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Transaction"))
}
