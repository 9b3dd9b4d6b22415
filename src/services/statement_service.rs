//! Plain-text account statements sent by email.

use uuid::Uuid;

use crate::{
    clients::email::{EmailSender, OutgoingEmail},
    db::DbPool,
    error::AppError,
    models::{
        profile::{Balance, Profile},
        transaction::{Transaction, format_cents},
    },
    services::{ledger_service, profile_service},
};

const STATEMENT_ENTRIES: i64 = 20;

/// Render the statement body.
pub fn render_statement(
    profile: &Profile,
    balance: &Balance,
    transactions: &[Transaction],
) -> String {
    let mut body = format!(
        "Hello {},\n\nAvailable balance: {} {}\n\n",
        profile.full_name.as_deref().unwrap_or(&profile.email),
        format_cents(balance.available_cents),
        balance.currency
    );

    if transactions.is_empty() {
        body.push_str("No recent activity.\n");
        return body;
    }

    body.push_str("Recent activity:\n");
    for t in transactions {
        let signed = if t.direction == "debit" {
            -t.amount_cents
        } else {
            t.amount_cents
        };
        body.push_str(&format!(
            "{}  {:>12}  {:<9}  {}\n",
            t.created_at.format("%Y-%m-%d"),
            format_cents(signed),
            t.status,
            t.description.as_deref().unwrap_or(&t.kind)
        ));
    }
    body
}

/// Email the caller their balance and latest ledger entries.
///
/// Unlike receipts this is the whole point of the request, so a delivery
/// failure is returned to the client.
pub async fn send_statement(
    pool: &DbPool,
    email: &dyn EmailSender,
    profile_id: Uuid,
) -> Result<String, AppError> {
    let profile = profile_service::get_profile(pool, profile_id).await?;
    let balance = profile_service::get_balance(pool, profile_id).await?;
    let transactions =
        ledger_service::list_transactions(pool, profile_id, STATEMENT_ENTRIES, None).await?;

    let message_id = email
        .send(&OutgoingEmail {
            to: profile.email.clone(),
            subject: "Your account statement".to_string(),
            text: render_statement(&profile, &balance, &transactions),
        })
        .await
        .map_err(AppError::Email)?;

    tracing::info!(%profile_id, %message_id, "Statement emailed");

    Ok(message_id)
}
