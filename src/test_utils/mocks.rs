//! In-memory implementations of the vendor traits.
//!
//! They record what they were asked to do so tests can assert on it, and
//! can be scripted to fail the way real vendors do.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    clients::{
        ai::{Completion, CompletionRequest, TextCompletion},
        email::{EmailSender, OutgoingEmail},
        payments::{
            CheckoutRequest, CheckoutSession, ConnectedAccount, ExternalAccount, PaymentIntent,
            PaymentProcessor, Transfer, TransferRequest,
        },
    },
    error::ClientError,
};

// ============================================================================
// Payment processor
// ============================================================================

/// How the next `create_transfer` call behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Transfer created; the id is derived from the idempotency key
    Succeed,
    /// Processor refused it (4xx)
    Reject,
    /// Processor executed it but the reply could not be decoded
    Garble,
}

#[derive(Default)]
pub struct FakePaymentProcessor {
    outcomes: Mutex<VecDeque<TransferOutcome>>,
    transfers: Mutex<Vec<TransferRequest>>,
}

impl FakePaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next transfer calls; once exhausted every call succeeds.
    pub fn with_transfer_outcomes(self, outcomes: &[TransferOutcome]) -> Self {
        self.outcomes.lock().unwrap().extend(outcomes.iter().copied());
        self
    }

    /// Every transfer request received, in order.
    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProcessor for FakePaymentProcessor {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ClientError> {
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.test/{}?profile={}", id, request.profile_id)),
            id,
        })
    }

    async fn create_payment_intent(
        &self,
        _profile_id: Uuid,
        _amount_cents: i64,
        _currency: &str,
    ) -> Result<PaymentIntent, ClientError> {
        let id = format!("pi_test_{}", Uuid::new_v4().simple());
        Ok(PaymentIntent {
            client_secret: Some(format!("{}_secret", id)),
            id,
            status: "requires_payment_method".to_string(),
        })
    }

    async fn create_connected_account(
        &self,
        profile_id: Uuid,
        _email: &str,
    ) -> Result<ConnectedAccount, ClientError> {
        Ok(ConnectedAccount {
            id: format!("acct_{}", profile_id.simple()),
        })
    }

    async fn attach_external_account(
        &self,
        _account_id: &str,
        token: &str,
    ) -> Result<ExternalAccount, ClientError> {
        Ok(ExternalAccount {
            id: format!("card_{}", token),
            brand: Some("Visa".to_string()),
            bank_name: None,
            last4: Some("4242".to_string()),
        })
    }

    async fn create_transfer(&self, request: &TransferRequest) -> Result<Transfer, ClientError> {
        self.transfers.lock().unwrap().push(request.clone());

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TransferOutcome::Succeed);

        match outcome {
            TransferOutcome::Succeed => Ok(Transfer {
                id: format!("tr_{}", request.idempotency_key),
            }),
            TransferOutcome::Reject => Err(ClientError::Api {
                status: 400,
                message: "insufficient available funds".to_string(),
            }),
            TransferOutcome::Garble => Err(ClientError::Deserialization("truncated body".to_string())),
        }
    }
}

// ============================================================================
// Email
// ============================================================================

#[derive(Default)]
pub struct FakeEmailSender {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl FakeEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for FakeEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, ClientError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(format!("msg_{}", sent.len()))
    }
}

// ============================================================================
// Text completion
// ============================================================================

/// Echoes the prompt back.
pub struct FakeTextCompletion;

#[async_trait]
impl TextCompletion for FakeTextCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ClientError> {
        Ok(Completion {
            text: format!("echo: {}", request.prompt),
            model: "fake-model".to_string(),
        })
    }
}
