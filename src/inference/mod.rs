pub mod data_url;
pub mod provider;
pub mod providers;
pub mod sse;
pub mod suggestions;
pub mod types;

pub use provider::{
    ChatRelay, ChatRequest, GENERIC_ERROR_MESSAGE, RATE_LIMIT_MESSAGE, RelayError,
    SuggestionRequest,
};
pub use providers::{GeminiProvider, OpenRouterProvider};
pub use types::{Message, MessageLog, Part, RelayEvent, Role, SessionStatus, ThinkingConfig};
