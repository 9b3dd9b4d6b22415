//! Payment processor webhook handler.
//!
//! POST /webhooks/payments is public; authenticity comes from the
//! `Stripe-Signature` header, checked against the raw request body before
//! anything is parsed.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

use crate::{
    error::AppError,
    models::webhook::{PaymentEvent, WebhookAck},
    services::webhook_service,
    state::AppState,
};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Receive a processor event.
///
/// # Response
///
/// - **200 OK** `{"received": true, "status": "applied" | "ignored" | "duplicate"}`
/// - **400**: Bad signature or unparseable body (the processor will retry)
/// - **500**: Database failure (the processor will retry; the event was not recorded)
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    webhook_service::verify_signature(
        signature,
        &body,
        &state.config.payments_webhook_secret,
        state.config.payments_webhook_tolerance_secs,
        chrono::Utc::now().timestamp(),
    )?;

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid event payload: {}", e)))?;

    let outcome = webhook_service::process_event(&state.pool, &event).await?;

    Ok(Json(WebhookAck {
        received: true,
        status: outcome.as_str(),
    }))
}
