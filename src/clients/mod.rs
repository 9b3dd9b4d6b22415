//! Vendor API clients.
//!
//! Each vendor sits behind an async trait so handlers only see the
//! operations they need and tests can substitute in-memory fakes.

pub mod ai;
pub mod email;
pub mod payments;

use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// Decode a vendor response, mapping non-2xx statuses to `ClientError`.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| ClientError::Deserialization(e.to_string()))
    } else if status.as_u16() == 401 {
        Err(ClientError::Unauthorized)
    } else if status.as_u16() == 429 {
        Err(ClientError::RateLimited)
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Shared reqwest client with the timeout used for every vendor call.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()
        .unwrap_or_default()
}
