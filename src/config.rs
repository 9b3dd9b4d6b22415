//! Service configuration read from the environment.
//!
//! Vendor keys default to empty so the service can start without them;
//! the affected endpoints then fail with `upstream_error` and a startup
//! warning names what is missing.

use serde::Deserialize;
use url::Url;

use crate::services::risk::AdvancePolicy;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `PAYMENTS_*`: payment processor credentials and webhook signing secret
/// - `AI_*`: generative text completion credentials and model
/// - `EMAIL_*`: transactional email credentials and sender address
/// - `ADVANCE_*`, `WITHDRAWAL_MIN_CENTS`: money movement limits
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_payments_api_base")]
    pub payments_api_base: String,

    #[serde(default)]
    pub payments_secret_key: String,

    #[serde(default)]
    pub payments_webhook_secret: String,

    #[serde(default = "default_webhook_tolerance")]
    pub payments_webhook_tolerance_secs: i64,

    #[serde(default = "default_checkout_success_url")]
    pub checkout_success_url: String,

    #[serde(default = "default_checkout_cancel_url")]
    pub checkout_cancel_url: String,

    #[serde(default = "default_ai_api_base")]
    pub ai_api_base: String,

    #[serde(default)]
    pub ai_api_key: String,

    #[serde(default = "default_ai_model")]
    pub ai_model: String,

    #[serde(default = "default_email_api_base")]
    pub email_api_base: String,

    #[serde(default)]
    pub email_api_key: String,

    #[serde(default = "default_email_from")]
    pub email_from: String,

    #[serde(default = "default_advance_max_cents")]
    pub advance_max_cents: i64,

    #[serde(default)]
    pub advance_min_account_age_days: i64,

    #[serde(default = "default_income_multiplier")]
    pub advance_income_multiplier: i64,

    #[serde(default = "default_withdrawal_min_cents")]
    pub withdrawal_min_cents: i64,
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_payments_api_base() -> String {
    "https://api.stripe.com".to_string()
}

/// Stripe's own libraries reject signatures older than five minutes.
fn default_webhook_tolerance() -> i64 {
    300
}

fn default_checkout_success_url() -> String {
    "http://localhost:5173/accounts?deposit=success".to_string()
}

fn default_checkout_cancel_url() -> String {
    "http://localhost:5173/accounts?deposit=cancelled".to_string()
}

fn default_ai_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_ai_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_email_api_base() -> String {
    "https://api.resend.com".to_string()
}

fn default_email_from() -> String {
    "Bank <no-reply@localhost>".to_string()
}

fn default_advance_max_cents() -> i64 {
    50_000
}

fn default_income_multiplier() -> i64 {
    2
}

fn default_withdrawal_min_cents() -> i64 {
    100
}

impl Config {
    /// Read `.env` when present, then the process environment.
    ///
    /// Field names map to upper-case variables (`database_url` -> `DATABASE_URL`).
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    /// Limits applied by the emergency advance risk check.
    pub fn advance_policy(&self) -> AdvancePolicy {
        AdvancePolicy {
            max_amount_cents: self.advance_max_cents,
            min_account_age_days: self.advance_min_account_age_days,
            income_multiplier: self.advance_income_multiplier,
        }
    }

    /// Reject malformed vendor and redirect URLs at startup instead of on first use.
    pub fn check_urls(&self) -> Result<(), InvalidUrl> {
        let urls = [
            ("PAYMENTS_API_BASE", &self.payments_api_base),
            ("AI_API_BASE", &self.ai_api_base),
            ("EMAIL_API_BASE", &self.email_api_base),
            ("CHECKOUT_SUCCESS_URL", &self.checkout_success_url),
            ("CHECKOUT_CANCEL_URL", &self.checkout_cancel_url),
        ];

        for (name, value) in urls {
            let parsed = Url::parse(value).map_err(|e| InvalidUrl {
                name,
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(InvalidUrl {
                    name,
                    reason: format!("unsupported scheme {}", parsed.scheme()),
                });
            }
        }

        Ok(())
    }

    /// Warn about vendor integrations that will fail at request time.
    pub fn log_missing_credentials(&self) {
        if self.payments_secret_key.is_empty() {
            tracing::warn!("PAYMENTS_SECRET_KEY not set, payment processor calls will be rejected");
        }
        if self.payments_webhook_secret.is_empty() {
            tracing::warn!("PAYMENTS_WEBHOOK_SECRET not set, all payment webhooks will be rejected");
        }
        if self.ai_api_key.is_empty() {
            tracing::warn!("AI_API_KEY not set, completion requests will fail");
        }
        if self.email_api_key.is_empty() {
            tracing::warn!("EMAIL_API_KEY not set, emails will not be delivered");
        }
    }
}

/// A configured URL that does not parse as http(s).
#[derive(Debug, thiserror::Error)]
#[error("{name} is not a valid URL: {reason}")]
pub struct InvalidUrl {
    pub name: &'static str,
    pub reason: String,
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    envy::from_iter::<_, Config>(vec![(
        "DATABASE_URL".to_string(),
        "postgres://localhost/bank_gateway_test".to_string(),
    )])
    .expect("minimal config deserializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = test_config();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.payments_webhook_tolerance_secs, 300);
        assert_eq!(config.advance_max_cents, 50_000);
        assert_eq!(config.withdrawal_min_cents, 100);
        assert!(config.payments_secret_key.is_empty());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = envy::from_iter::<_, Config>(vec![
            ("DATABASE_URL".to_string(), "postgres://db".to_string()),
            ("SERVER_PORT".to_string(), "8080".to_string()),
            ("ADVANCE_MAX_CENTS".to_string(), "25000".to_string()),
            ("ADVANCE_INCOME_MULTIPLIER".to_string(), "0".to_string()),
        ])
        .unwrap();

        assert_eq!(config.server_port, 8080);
        let policy = config.advance_policy();
        assert_eq!(policy.max_amount_cents, 25_000);
        assert_eq!(policy.income_multiplier, 0);
    }

    #[test]
    fn default_urls_are_valid() {
        assert!(test_config().check_urls().is_ok());
    }

    #[test]
    fn malformed_url_names_the_variable() {
        let mut config = test_config();
        config.checkout_cancel_url = "not a url".to_string();
        let err = config.check_urls().unwrap_err();
        assert_eq!(err.name, "CHECKOUT_CANCEL_URL");

        config.checkout_cancel_url = "ftp://example.com/cancel".to_string();
        assert!(config.check_urls().is_err());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let result = envy::from_iter::<_, Config>(Vec::<(String, String)>::new());
        assert!(result.is_err());
    }
}
