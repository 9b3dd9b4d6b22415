//! Generative text completion pass-through.
//!
//! POST /api/v1/ai/complete forwards one prompt to the configured model.
//! The service keeps no conversation state; the client sends whatever
//! context it wants in the prompt.

use axum::{Extension, Json, extract::State};
use serde::Deserialize;

use crate::{
    clients::ai::{Completion, CompletionRequest},
    error::AppError,
    middleware::auth::AuthContext,
    state::AppState,
};

const MAX_PROMPT_CHARS: usize = 8_000;

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub prompt: String,

    #[serde(default)]
    pub system_instruction: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,
}

fn validate(request: CompleteRequest) -> Result<CompletionRequest, AppError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::InvalidRequest("prompt is required".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(AppError::InvalidRequest(format!(
            "prompt exceeds {} characters",
            MAX_PROMPT_CHARS
        )));
    }
    if let Some(t) = request.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(AppError::InvalidRequest(
                "temperature must be between 0 and 2".to_string(),
            ));
        }
    }

    Ok(CompletionRequest {
        prompt: prompt.to_string(),
        system_instruction: request.system_instruction.filter(|s| !s.trim().is_empty()),
        temperature: request.temperature,
    })
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<Completion>, AppError> {
    let request = validate(request)?;

    let completion = state.ai.complete(&request).await.map_err(AppError::Ai)?;

    tracing::info!(
        profile_id = %auth.profile_id,
        prompt_chars = request.prompt.len(),
        completion_chars = completion.text.len(),
        "Completion served"
    );

    Ok(Json(completion))
}
