//! Payment processor client (Stripe REST API).
//!
//! Only the hosted primitives the service needs are wrapped: checkout
//! sessions and payment intents for deposits, custom connected accounts
//! plus tokenized external accounts for card vaulting, and transfers for
//! withdrawals. Requests are form-encoded as the processor expects.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{handle_response, http_client};
use crate::error::ClientError;

/// Deposit flows; stored in processor metadata so the webhook knows which
/// event is authoritative for crediting the balance.
pub const FLOW_CHECKOUT: &str = "checkout";
pub const FLOW_INTENT: &str = "intent";

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub profile_id: Uuid,
    pub email: String,
    pub amount_cents: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectedAccount {
    pub id: String,
}

/// Card or bank account attached to a connected account.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalAccount {
    pub id: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub profile_id: Uuid,
    pub destination: String,
    pub amount_cents: i64,
    pub currency: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transfer {
    pub id: String,
}

/// Operations the service delegates to the payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ClientError>;

    async fn create_payment_intent(
        &self,
        profile_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> Result<PaymentIntent, ClientError>;

    async fn create_connected_account(
        &self,
        profile_id: Uuid,
        email: &str,
    ) -> Result<ConnectedAccount, ClientError>;

    async fn attach_external_account(
        &self,
        account_id: &str,
        token: &str,
    ) -> Result<ExternalAccount, ClientError>;

    async fn create_transfer(&self, request: &TransferRequest) -> Result<Transfer, ClientError>;
}

pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(base_url: &str, secret_key: String) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, ClientError> {
        if self.secret_key.is_empty() {
            return Err(ClientError::NotConfigured("PAYMENTS_SECRET_KEY"));
        }

        let mut request = self
            .http
            .post(self.api_url(path))
            .bearer_auth(&self.secret_key)
            .form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await?;
        handle_response(response).await
    }
}

fn pair(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

pub(crate) fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    vec![
        pair("mode", "payment"),
        pair("success_url", &request.success_url),
        pair("cancel_url", &request.cancel_url),
        pair("customer_email", &request.email),
        pair("client_reference_id", request.profile_id),
        pair(
            "line_items[0][price_data][currency]",
            request.currency.to_lowercase(),
        ),
        pair(
            "line_items[0][price_data][product_data][name]",
            "Account deposit",
        ),
        pair(
            "line_items[0][price_data][unit_amount]",
            request.amount_cents,
        ),
        pair("line_items[0][quantity]", 1),
        pair("metadata[profile_id]", request.profile_id),
        pair("metadata[flow]", FLOW_CHECKOUT),
    ]
}

pub(crate) fn payment_intent_form(
    profile_id: Uuid,
    amount_cents: i64,
    currency: &str,
) -> Vec<(String, String)> {
    vec![
        pair("amount", amount_cents),
        pair("currency", currency.to_lowercase()),
        pair("automatic_payment_methods[enabled]", true),
        pair("metadata[profile_id]", profile_id),
        pair("metadata[flow]", FLOW_INTENT),
    ]
}

pub(crate) fn transfer_form(request: &TransferRequest) -> Vec<(String, String)> {
    vec![
        pair("amount", request.amount_cents),
        pair("currency", request.currency.to_lowercase()),
        pair("destination", &request.destination),
        pair("metadata[profile_id]", request.profile_id),
    ]
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ClientError> {
        self.post_form("/checkout/sessions", &checkout_form(request), None)
            .await
    }

    async fn create_payment_intent(
        &self,
        profile_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> Result<PaymentIntent, ClientError> {
        let form = payment_intent_form(profile_id, amount_cents, currency);
        self.post_form("/payment_intents", &form, None).await
    }

    async fn create_connected_account(
        &self,
        profile_id: Uuid,
        email: &str,
    ) -> Result<ConnectedAccount, ClientError> {
        let form = vec![
            pair("type", "custom"),
            pair("country", "US"),
            pair("email", email),
            pair("capabilities[transfers][requested]", true),
            pair("metadata[profile_id]", profile_id),
        ];
        self.post_form("/accounts", &form, None).await
    }

    async fn attach_external_account(
        &self,
        account_id: &str,
        token: &str,
    ) -> Result<ExternalAccount, ClientError> {
        let form = vec![pair("external_account", token)];
        self.post_form(
            &format!("/accounts/{}/external_accounts", account_id),
            &form,
            None,
        )
        .await
    }

    async fn create_transfer(&self, request: &TransferRequest) -> Result<Transfer, ClientError> {
        self.post_form(
            "/transfers",
            &transfer_form(request),
            Some(&request.idempotency_key),
        )
        .await
    }
}
