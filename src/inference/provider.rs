use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use super::types::{Message, RelayEvent, ThinkingConfig};

/// Shown when the provider reports rate limiting.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
/// Shown for every other relay failure.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred.";

/// Errors that can occur while talking to the hosted model.
/// The `Display` form is for logs; the UI only ever sees [`RelayError::user_message`].
#[derive(Debug)]
pub enum RelayError {
    /// Relay misconfigured (missing API key, bad URL).
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused, dropped stream).
    Network(String),
    /// The provider returned an error response or an in-stream error object.
    Api { status: u16, message: String },
    /// The provider is throttling us.
    RateLimited(String),
    /// Failed to parse the provider's response.
    Parse(String),
    /// The receiving side of the event channel went away.
    ChannelClosed,
}

impl RelayError {
    /// Rate limiting is recognised by status code or by the provider's wording.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            RelayError::RateLimited(_) => true,
            RelayError::Api { status: 429, .. } => true,
            RelayError::Api { message, .. } | RelayError::Network(message) => {
                let lower = message.to_ascii_lowercase();
                lower.contains("rate limit") || lower.contains("resource_exhausted")
            }
            _ => false,
        }
    }

    /// The fixed string the UI displays for this failure.
    pub fn user_message(&self) -> &'static str {
        if self.is_rate_limit() {
            RATE_LIMIT_MESSAGE
        } else {
            GENERIC_ERROR_MESSAGE
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(msg) => write!(f, "config error: {msg}"),
            RelayError::Network(msg) => write!(f, "network error: {msg}"),
            RelayError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            RelayError::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            RelayError::Parse(msg) => write!(f, "parse error: {msg}"),
            RelayError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for RelayError {}

/// Everything a relay needs to stream one assistant turn.
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub thinking: ThinkingConfig,
    /// Enables the provider's web search / URL context tools.
    pub search_grounding: bool,
}

/// Input for the follow-up question generator.
pub struct SuggestionRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
}

/// The seam between the chat session and a hosted model.
#[async_trait]
pub trait ChatRelay: Send + Sync {
    /// Returns the name of the relay.
    fn name(&self) -> &str;

    /// Streams one assistant response for the given log, sending events in arrival order.
    async fn stream_chat(
        &self,
        request: ChatRequest<'_>,
        sender: Sender<RelayEvent>,
    ) -> Result<(), RelayError>;

    /// Generates exactly three follow-up questions about the prompt.
    async fn suggest(&self, request: SuggestionRequest<'_>) -> Result<Vec<String>, RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_429_is_rate_limit() {
        let err = RelayError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(err.user_message(), RATE_LIMIT_MESSAGE);
    }

    #[test]
    fn test_rate_limit_wording_is_detected() {
        let err = RelayError::Api {
            status: 400,
            message: "Rate limit reached for requests".to_string(),
        };
        assert!(err.is_rate_limit());

        let err = RelayError::Network("upstream said RESOURCE_EXHAUSTED".to_string());
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_other_errors_are_generic() {
        for err in [
            RelayError::Config("missing key".to_string()),
            RelayError::Network("connection refused".to_string()),
            RelayError::Api {
                status: 500,
                message: "boom".to_string(),
            },
            RelayError::Parse("bad json".to_string()),
            RelayError::ChannelClosed,
        ] {
            assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE, "{err}");
        }
    }

    #[test]
    fn test_display_keeps_detail_for_logs() {
        let err = RelayError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error (HTTP 503): overloaded");
    }
}
