//! Transactional email client (Resend REST API).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{handle_response, http_client};
use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send one email, returning the provider's message id.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, ClientError>;
}

pub struct ResendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl ResendClient {
    pub fn new(base_url: &str, api_key: String, from: String) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            from,
        }
    }
}

#[derive(Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, ClientError> {
        if self.api_key.is_empty() {
            return Err(ClientError::NotConfigured("EMAIL_API_KEY"));
        }

        let body = SendEmailBody {
            from: &self.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            text: &email.text,
        };

        let response = self
            .http
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let sent: SendEmailResponse = handle_response(response).await?;
        Ok(sent.id)
    }
}

/// Send without failing the caller; money has already moved when receipts go out.
pub async fn send_best_effort(sender: &dyn EmailSender, email: OutgoingEmail) {
    match sender.send(&email).await {
        Ok(id) => tracing::info!(message_id = %id, subject = %email.subject, "Email sent"),
        Err(e) => tracing::warn!(error = %e, subject = %email.subject, "Email delivery failed"),
    }
}
