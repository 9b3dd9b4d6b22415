//! Profile sign-up and dashboard reads.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, conflict_on_unique},
    middleware::auth::{generate_token, hash_token},
    models::{
        advance::{Advance, STATUS_DISBURSED},
        pocket::{Pocket, PocketResponse},
        profile::{Balance, CreateProfileRequest, DashboardResponse, Profile},
    },
    services::notification_service,
};

/// Normalise and check an email address.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.contains(char::is_whitespace);

    if !valid {
        return Err(AppError::InvalidRequest("Invalid email address".to_string()));
    }
    Ok(email)
}

/// Check an ISO 4217 style code and upper-case it.
pub fn normalize_currency(currency: &str) -> Result<String, AppError> {
    let currency = currency.trim().to_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::InvalidRequest(
            "Currency must be a 3-letter code".to_string(),
        ));
    }
    Ok(currency)
}

/// Create a profile, its zero balance and its first access token.
///
/// All three rows are written in one database transaction. The plaintext
/// token is returned here and never stored.
pub async fn create_profile(
    pool: &DbPool,
    request: CreateProfileRequest,
) -> Result<(Profile, String), AppError> {
    let email = normalize_email(&request.email)?;
    let currency = normalize_currency(&request.currency)?;
    let full_name = request
        .full_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let mut tx = pool.begin().await?;

    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (email, full_name) VALUES ($1, $2) RETURNING *",
    )
    .bind(&email)
    .bind(&full_name)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict_on_unique(e, "Email already registered"))?;

    sqlx::query("INSERT INTO balances (profile_id, currency) VALUES ($1, $2)")
        .bind(profile.id)
        .bind(&currency)
        .execute(&mut *tx)
        .await?;

    let token = generate_token();
    sqlx::query("INSERT INTO access_tokens (profile_id, token_hash) VALUES ($1, $2)")
        .bind(profile.id)
        .bind(hash_token(&token))
        .execute(&mut *tx)
        .await?;

    notification_service::notify(
        &mut *tx,
        profile.id,
        "Welcome",
        "Your account is ready. Add funds to get started.",
    )
    .await?;

    tx.commit().await?;

    tracing::info!(profile_id = %profile.id, "Profile created");

    Ok((profile, token))
}

pub async fn get_profile(pool: &DbPool, profile_id: Uuid) -> Result<Profile, AppError> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Profile"))
}

pub async fn get_balance(pool: &DbPool, profile_id: Uuid) -> Result<Balance, AppError> {
    sqlx::query_as::<_, Balance>("SELECT * FROM balances WHERE profile_id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Balance"))
}

/// Everything the dashboard renders on load.
pub async fn dashboard(pool: &DbPool, profile_id: Uuid) -> Result<DashboardResponse, AppError> {
    let profile = get_profile(pool, profile_id).await?;
    let balance = get_balance(pool, profile_id).await?;

    let pockets = sqlx::query_as::<_, Pocket>(
        "SELECT * FROM pockets WHERE profile_id = $1 ORDER BY created_at",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;
    let pockets_total_cents = pockets.iter().map(|p| p.balance_cents).sum();

    let outstanding_advance = sqlx::query_as::<_, Advance>(
        "SELECT * FROM advances WHERE profile_id = $1 AND status = $2",
    )
    .bind(profile_id)
    .bind(STATUS_DISBURSED)
    .fetch_optional(pool)
    .await?;

    let unread_notifications = notification_service::unread_count(pool, profile_id).await?;

    Ok(DashboardResponse {
        profile: profile.into(),
        balance_cents: balance.available_cents,
        currency: balance.currency,
        pockets: pockets.into_iter().map(PocketResponse::from).collect(),
        pockets_total_cents,
        outstanding_advance: outstanding_advance.map(Into::into),
        unread_notifications,
    })
}
