//! Provider adapters behind [`ChatRelay`](super::ChatRelay).

mod gemini;
mod openrouter;

pub use gemini::{DEFAULT_GEMINI_BASE_URL, GeminiProvider};
pub use openrouter::{DEFAULT_OPENROUTER_BASE_URL, OpenRouterProvider};

use std::time::Duration;

use log::warn;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;

use super::provider::RelayError;
use super::types::RelayEvent;

/// Builds the HTTP client with the relay's maximum request duration.
fn http_client(max_duration: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(max_duration)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Forwards one event to the session, failing if the receiver is gone.
async fn emit(sender: &Sender<RelayEvent>, event: RelayEvent) -> Result<(), RelayError> {
    sender.send(event).await.map_err(|_| {
        warn!("Relay event send failed: receiver dropped");
        RelayError::ChannelClosed
    })
}

/// `{"error": {"message": ..., "status": ...}}` as both Gemini and OpenRouter send it.
#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Converts a provider error payload into a [`RelayError`].
fn classify_error(status: u16, body: &str) -> RelayError {
    let (message, provider_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.message, env.error.status),
        Err(_) => (body.to_string(), None),
    };
    if status == 429 || provider_status.as_deref() == Some("RESOURCE_EXHAUSTED") {
        return RelayError::RateLimited(message);
    }
    RelayError::Api { status, message }
}

/// Passes successful responses through; turns HTTP errors into [`RelayError`]s.
async fn check_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response, RelayError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    warn!("{} API error: {} - {}", provider, status, body);
    Err(classify_error(status, &body))
}
