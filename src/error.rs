//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::risk::RiskReport;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing bearer tokens, bad webhook signatures
/// - **Resource Errors**: Requested rows not found or not owned by the caller
/// - **Business Logic Errors**: Insufficient balance, declined or duplicate advances
/// - **Upstream Errors**: Payment processor, AI or email vendor failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bearer token is missing, unknown, or revoked.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid access token")]
    InvalidToken,

    /// Requested row does not exist or belongs to another profile.
    ///
    /// Returns HTTP 404 Not Found. The string names the resource kind.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Balance (or pocket) cannot cover the requested debit.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Unique constraint hit (duplicate email, pocket name, payout method).
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Risk check rejected the emergency advance.
    ///
    /// Returns HTTP 422 with the full stage report.
    #[error("Advance declined")]
    AdvanceDeclined(Box<RiskReport>),

    /// Profile already holds an advance that has not been repaid.
    #[error("An advance is already outstanding")]
    AdvanceOutstanding,

    /// Payment webhook signature missing, malformed, stale or wrong.
    ///
    /// Returns HTTP 400 so the processor does not treat it as delivered.
    #[error("Invalid webhook signature")]
    InvalidWebhookSignature,

    /// Payment processor call failed.
    #[error("Payment processor error: {0}")]
    Payments(ClientError),

    /// Generative text completion call failed.
    #[error("AI provider error: {0}")]
    Ai(ClientError),

    /// Transactional email call failed.
    #[error("Email provider error: {0}")]
    Email(ClientError),

    /// Server-side fault that is not the caller's doing.
    ///
    /// Returns HTTP 500; the message is logged, never sent.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure talking to a vendor REST API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limited")]
    RateLimited,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Deserialization(String),

    #[error("Client not configured: {0}")]
    NotConfigured(&'static str),
}

impl ClientError {
    /// Whether the vendor certainly did not act on the request.
    ///
    /// Timeouts, 5xx and undecodable 2xx bodies leave the outcome unknown:
    /// the vendor may have executed the call before the failure.
    pub fn is_definitive_rejection(&self) -> bool {
        match self {
            ClientError::Transport(e) => e.is_connect() || e.is_builder(),
            ClientError::Api { status, .. } => (400..500).contains(status),
            ClientError::Unauthorized
            | ClientError::RateLimited
            | ClientError::NotConfigured(_) => true,
            ClientError::Deserialization(_) => false,
        }
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(e) => e.is_timeout() || e.is_connect(),
            ClientError::RateLimited => true,
            ClientError::Api { status, .. } => *status >= 500,
            ClientError::Unauthorized
            | ClientError::Deserialization(_)
            | ClientError::NotConfigured(_) => false,
        }
    }
}

/// Map a Postgres unique violation to `Conflict`, pass everything else through.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(err),
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Declined advances add a `details` object holding the stage report.
/// Database and vendor failures are logged and hidden from the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;

        let (status, code, message) = match self {
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                self.to_string(),
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::InsufficientBalance => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_balance",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::AdvanceDeclined(ref report) => {
                details = serde_json::to_value(report.as_ref()).ok();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "advance_declined",
                    self.to_string(),
                )
            }
            AppError::AdvanceOutstanding => (
                StatusCode::CONFLICT,
                "advance_outstanding",
                self.to_string(),
            ),
            AppError::InvalidWebhookSignature => (
                StatusCode::BAD_REQUEST,
                "invalid_signature",
                self.to_string(),
            ),
            AppError::Payments(ref e) | AppError::Ai(ref e) | AppError::Email(ref e) => {
                tracing::error!(transient = e.is_transient(), "{}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "An upstream provider failed".to_string(),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_variant() {
        let cases = [
            (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
            (AppError::NotFound("Pocket"), StatusCode::NOT_FOUND),
            (
                AppError::InsufficientBalance,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::InvalidRequest("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::AdvanceOutstanding, StatusCode::CONFLICT),
            (AppError::InvalidWebhookSignature, StatusCode::BAD_REQUEST),
            (
                AppError::Payments(ClientError::RateLimited),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Internal("report encoding".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(AppError::NotFound("Recipient").to_string(), "Recipient not found");
    }

    #[test]
    fn transient_classification() {
        assert!(ClientError::RateLimited.is_transient());
        assert!(
            ClientError::Api {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !ClientError::Api {
                status: 402,
                message: "card_declined".into()
            }
            .is_transient()
        );
        assert!(!ClientError::Unauthorized.is_transient());
    }

    #[test]
    fn only_refusals_count_as_definitive() {
        assert!(ClientError::Unauthorized.is_definitive_rejection());
        assert!(ClientError::NotConfigured("PAYMENTS_SECRET_KEY").is_definitive_rejection());
        assert!(
            ClientError::Api {
                status: 402,
                message: "card_declined".into()
            }
            .is_definitive_rejection()
        );
        assert!(
            !ClientError::Api {
                status: 502,
                message: String::new()
            }
            .is_definitive_rejection()
        );
        assert!(!ClientError::Deserialization("truncated body".into()).is_definitive_rejection());
    }
}
