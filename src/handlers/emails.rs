//! Transactional email handler.

use axum::{Extension, Json, extract::State};
use serde::Serialize;

use crate::{
    error::AppError, middleware::auth::AuthContext, services::statement_service,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct EmailSentResponse {
    pub message_id: String,
}

/// POST /api/v1/emails/statement - email the caller their recent activity.
pub async fn send_statement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<EmailSentResponse>, AppError> {
    let message_id =
        statement_service::send_statement(&state.pool, state.email.as_ref(), auth.profile_id)
            .await?;

    Ok(Json(EmailSentResponse { message_id }))
}
