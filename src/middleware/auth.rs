//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the access token from the Authorization header
//! 2. Hash it and verify it exists in the database
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{db::DbPool, error::AppError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Handlers extract it with `Extension<AuthContext>` and scope every
/// query by `profile_id`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub profile_id: Uuid,
    pub email: String,
}

#[derive(sqlx::FromRow)]
struct TokenOwner {
    profile_id: Uuid,
    email: String,
}

/// Bearer token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Hash the `<token>` using SHA-256
/// 3. Query database for matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or(AppError::InvalidToken)?;

    let owner = sqlx::query_as::<_, TokenOwner>(
        "SELECT p.id AS profile_id, p.email
         FROM access_tokens t
         JOIN profiles p ON p.id = t.profile_id
         WHERE t.token_hash = $1 AND t.is_active = true",
    )
    .bind(hash_token(token))
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidToken)?;

    request.extensions_mut().insert(AuthContext {
        profile_id: owner.profile_id,
        email: owner.email,
    });

    Ok(next.run(request).await)
}

/// SHA-256 hex digest stored in place of the token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// New random access token (64 hex characters, 32 bytes of randomness).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}
