//! Deposit, card vaulting and withdrawal handlers.
//!
//! - POST /api/v1/deposits/checkout - Hosted checkout session
//! - POST /api/v1/deposits/intent - Payment intent for in-app card entry
//! - POST /api/v1/payout-methods - Vault a tokenized card
//! - GET /api/v1/payout-methods - List vaulted cards
//! - POST /api/v1/withdrawals - Pay out to a vaulted card

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    clients::email::{OutgoingEmail, send_best_effort},
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        payout_method::{
            CheckoutResponse, DepositRequest, PaymentIntentResponse, PayoutMethodResponse,
            VaultCardRequest, WithdrawalRequest,
        },
        transaction::{TransactionResponse, format_cents},
    },
    services::payments_service,
    state::AppState,
};

/// Start a hosted checkout. The balance is credited when the processor's
/// `checkout.session.completed` webhook arrives, not here.
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let checkout = payments_service::create_checkout(
        &state.pool,
        state.payments.as_ref(),
        &state.config,
        auth.profile_id,
        request.amount_cents,
    )
    .await?;

    Ok(Json(checkout))
}

/// Create a payment intent; the client confirms it with the returned secret.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<PaymentIntentResponse>, AppError> {
    let intent = payments_service::create_payment_intent(
        &state.pool,
        state.payments.as_ref(),
        auth.profile_id,
        request.amount_cents,
    )
    .await?;

    Ok(Json(intent))
}

pub async fn vault_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<VaultCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    let method = payments_service::vault_card(
        &state.pool,
        state.payments.as_ref(),
        auth.profile_id,
        &request.token,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(PayoutMethodResponse::from(method))))
}

pub async fn list_payout_methods(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PayoutMethodResponse>>, AppError> {
    let methods = payments_service::list_payout_methods(&pool, auth.profile_id).await?;
    Ok(Json(methods.into_iter().map(Into::into).collect()))
}

/// Withdraw to a vaulted card.
///
/// # Request Body
///
/// ```json
/// {
///   "payout_method_id": "550e8400-...",
///   "amount_cents": 5000,
///   "idempotency_key": "withdraw-2025-03-01"
/// }
/// ```
///
/// # Response
///
/// - **200 OK**: Completed withdrawal (or the stored entry on replay); a
///   receipt email is sent in the background
/// - **422**: Insufficient balance
/// - **502**: Processor rejected the transfer and the funds were returned,
///   or the outcome is unknown and the funds stay reserved until the
///   request is retried with the same `idempotency_key`
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    let applied = payments_service::withdraw(
        &state.pool,
        state.payments.as_ref(),
        state.config.withdrawal_min_cents,
        auth.profile_id,
        request.payout_method_id,
        request.amount_cents,
        &request.idempotency_key,
    )
    .await?;

    if applied.is_replay() {
        return Ok(Json(applied.into_inner().into()));
    }

    let transaction = applied.into_inner();
    let email = state.email.clone();
    let receipt = OutgoingEmail {
        to: auth.email,
        subject: "Your withdrawal is on its way".to_string(),
        text: format!(
            "{} has been sent to your card. Reference: {}",
            format_cents(transaction.amount_cents),
            transaction.processor_ref.as_deref().unwrap_or_default()
        ),
    };
    tokio::spawn(async move { send_best_effort(email.as_ref(), receipt).await });

    Ok(Json(transaction.into()))
}
