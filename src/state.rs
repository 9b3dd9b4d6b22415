//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    clients::{
        ai::{GeminiClient, TextCompletion},
        email::{EmailSender, ResendClient},
        payments::{PaymentProcessor, StripeClient},
    },
    config::Config,
    db::DbPool,
};

/// Connection pool, configuration and vendor clients.
///
/// Cloned per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub payments: Arc<dyn PaymentProcessor>,
    pub ai: Arc<dyn TextCompletion>,
    pub email: Arc<dyn EmailSender>,
}

impl AppState {
    /// Build the state with the real vendor clients described by `config`.
    pub fn new(pool: DbPool, config: Config) -> Self {
        let payments = StripeClient::new(
            &config.payments_api_base,
            config.payments_secret_key.clone(),
        );
        let ai = GeminiClient::new(
            &config.ai_api_base,
            config.ai_api_key.clone(),
            config.ai_model.clone(),
        );
        let email = ResendClient::new(
            &config.email_api_base,
            config.email_api_key.clone(),
            config.email_from.clone(),
        );

        Self {
            pool,
            config: Arc::new(config),
            payments: Arc::new(payments),
            ai: Arc::new(ai),
            email: Arc::new(email),
        }
    }
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
