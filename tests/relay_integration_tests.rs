use std::time::Duration;

use lumen::inference::{
    ChatRelay, ChatRequest, GENERIC_ERROR_MESSAGE, GeminiProvider, Message, OpenRouterProvider,
    RATE_LIMIT_MESSAGE, RelayError, RelayEvent, SuggestionRequest, ThinkingConfig,
};
use tokio::sync::mpsc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

// ============================================================================
// Helper Functions
// ============================================================================

const TIMEOUT: Duration = Duration::from_secs(30);

fn conversation() -> Vec<Message> {
    vec![Message::user("Hello", vec![])]
}

fn chat_request<'a>(messages: &'a [Message], search_grounding: bool) -> ChatRequest<'a> {
    ChatRequest {
        messages,
        model: "test-model",
        system_prompt: "Be brief.",
        thinking: ThinkingConfig::default(),
        search_grounding,
    }
}

/// Runs one stream to completion and returns the result with every event sent.
async fn run_stream(
    relay: &dyn ChatRelay,
    request: ChatRequest<'_>,
) -> (Result<(), RelayError>, Vec<RelayEvent>) {
    let (tx, mut rx) = mpsc::channel(100);
    let result = relay.stream_chat(request, tx).await;
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

fn text(s: &str) -> RelayEvent {
    RelayEvent::TextDelta(s.to_string())
}

fn gemini(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new("test-key".to_string(), Some(server.uri()), TIMEOUT)
}

fn openrouter(server: &MockServer) -> OpenRouterProvider {
    OpenRouterProvider::new("test-key".to_string(), Some(server.uri()), TIMEOUT)
}

const GEMINI_PATH: &str = "/models/test-model:streamGenerateContent";

// ============================================================================
// Gemini Relay Tests
// ============================================================================

#[tokio::test]
async fn test_gemini_streams_text_in_order() {
    let server = MockServer::start().await;
    let sse = "\
data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hello\"}]}}]}

data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" world\"}]},\"finishReason\":\"STOP\"}]}

";
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .expect(1)
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = gemini(&server);
    let (result, events) = run_stream(&provider, chat_request(&messages, false)).await;

    assert!(result.is_ok());
    assert_eq!(events, vec![text("Hello"), text(" world"), RelayEvent::Finished]);
}

#[tokio::test]
async fn test_gemini_thoughts_and_grounding_sources() {
    let server = MockServer::start().await;
    let sse = "\
data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Looking it up\",\"thought\":true}]}}]}

data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Rust 1.85 shipped.\"}]},\"groundingMetadata\":{\"groundingChunks\":[{\"web\":{\"uri\":\"https://blog.rust-lang.org\",\"title\":\"Rust Blog\"}}]}}]}

";
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(body_string_contains("googleSearch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = gemini(&server);
    let (result, events) = run_stream(&provider, chat_request(&messages, true)).await;

    assert!(result.is_ok());
    assert_eq!(
        events,
        vec![
            RelayEvent::ReasoningDelta("Looking it up".to_string()),
            text("Rust 1.85 shipped."),
            RelayEvent::Source {
                url: "https://blog.rust-lang.org".to_string(),
                title: Some("Rust Blog".to_string()),
            },
            RelayEvent::Finished,
        ]
    );
}

#[tokio::test]
async fn test_gemini_skips_malformed_frames() {
    let server = MockServer::start().await;
    let sse = "\
data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"A\"}]}}]}

data: {not json

data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"B\"}]}}]}

";
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = gemini(&server);
    let (result, events) = run_stream(&provider, chat_request(&messages, false)).await;

    assert!(result.is_ok());
    assert_eq!(events, vec![text("A"), text("B"), RelayEvent::Finished]);
}

#[tokio::test]
async fn test_gemini_rate_limit_maps_to_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string(
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        ))
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = gemini(&server);
    let (result, events) = run_stream(&provider, chat_request(&messages, false)).await;

    let err = result.unwrap_err();
    assert!(err.is_rate_limit());
    assert_eq!(err.user_message(), RATE_LIMIT_MESSAGE);
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_gemini_server_error_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = gemini(&server);
    let (result, _) = run_stream(&provider, chat_request(&messages, false)).await;

    let err = result.unwrap_err();
    assert!(matches!(err, RelayError::Api { status: 500, .. }));
    assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_gemini_suggestions() {
    let server = MockServer::start().await;
    let sse = "\
data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"{\\\"suggestions\\\":[\\\"What is ownership?\\\",\"}]}}]}

data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"\\\"What is borrowing?\\\",\\\"What are lifetimes?\\\"]}\"}]}}]}

";
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(body_string_contains("application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&server)
        .await;

    let provider = gemini(&server);
    let suggestions = provider
        .suggest(SuggestionRequest {
            prompt: "Teach me Rust",
            model: "test-model",
        })
        .await
        .unwrap();

    assert_eq!(
        suggestions,
        vec!["What is ownership?", "What is borrowing?", "What are lifetimes?"]
    );
}

// ============================================================================
// OpenRouter Relay Tests
// ============================================================================

#[tokio::test]
async fn test_openrouter_streams_reasoning_text_and_citations() {
    let server = MockServer::start().await;
    let sse = "\
event: response.created
data: {\"type\":\"response.created\"}

event: response.reasoning_text.delta
data: {\"type\":\"response.reasoning_text.delta\",\"delta\":\"Thinking...\"}

event: response.output_text.delta
data: {\"type\":\"response.output_text.delta\",\"delta\":\"Answer\"}

event: response.output_text.annotation.added
data: {\"type\":\"response.output_text.annotation.added\",\"annotation\":{\"type\":\"url_citation\",\"url\":\"https://a.example\",\"title\":\"A\"}}

event: response.completed
data: {\"type\":\"response.completed\"}

";
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .expect(1)
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = openrouter(&server);
    let (result, events) = run_stream(&provider, chat_request(&messages, false)).await;

    assert!(result.is_ok());
    assert_eq!(
        events,
        vec![
            RelayEvent::ReasoningDelta("Thinking...".to_string()),
            text("Answer"),
            RelayEvent::Source {
                url: "https://a.example".to_string(),
                title: Some("A".to_string()),
            },
            RelayEvent::Finished,
        ]
    );
}

#[tokio::test]
async fn test_openrouter_body_end_without_completion_keeps_text() {
    let server = MockServer::start().await;
    let sse = "\
event: response.output_text.delta
data: {\"type\":\"response.output_text.delta\",\"delta\":\"partial\"}

";
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = openrouter(&server);
    let (result, events) = run_stream(&provider, chat_request(&messages, false)).await;

    assert!(result.is_ok());
    assert_eq!(events, vec![text("partial"), RelayEvent::Finished]);
}

#[tokio::test]
async fn test_openrouter_in_stream_failure() {
    let server = MockServer::start().await;
    let sse = "\
event: response.output_text.delta
data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hel\"}

event: response.failed
data: {\"type\":\"response.failed\",\"response\":{\"error\":{\"code\":\"rate_limit_exceeded\",\"message\":\"slow down\"}}}

";
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = openrouter(&server);
    let (result, events) = run_stream(&provider, chat_request(&messages, false)).await;

    assert_eq!(result.unwrap_err().user_message(), RATE_LIMIT_MESSAGE);
    assert_eq!(events, vec![text("Hel")]);
}

#[tokio::test]
async fn test_openrouter_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let messages = conversation();
    let provider = openrouter(&server);
    let (result, _) = run_stream(&provider, chat_request(&messages, false)).await;

    let err = result.unwrap_err();
    assert!(matches!(err, RelayError::Api { status: 401, .. }));
    assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_openrouter_suggestions_use_json_schema() {
    let server = MockServer::start().await;
    let sse = "\
event: response.output_text.delta
data: {\"type\":\"response.output_text.delta\",\"delta\":\"{\\\"suggestions\\\":[\\\"Q1?\\\",\\\"Q2?\\\",\\\"Q3?\\\"]}\"}

event: response.completed
data: {\"type\":\"response.completed\"}

";
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_string_contains("json_schema"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&server)
        .await;

    let provider = openrouter(&server);
    let suggestions = provider
        .suggest(SuggestionRequest {
            prompt: "Teach me Rust",
            model: "test-model",
        })
        .await
        .unwrap();

    assert_eq!(suggestions, vec!["Q1?", "Q2?", "Q3?"]);
}

#[tokio::test]
async fn test_openrouter_suggestions_reject_wrong_count() {
    let server = MockServer::start().await;
    let sse = "\
event: response.output_text.delta
data: {\"type\":\"response.output_text.delta\",\"delta\":\"{\\\"suggestions\\\":[\\\"Only one?\\\"]}\"}

event: response.completed
data: {\"type\":\"response.completed\"}

";
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse))
        .mount(&server)
        .await;

    let provider = openrouter(&server);
    let result = provider
        .suggest(SuggestionRequest {
            prompt: "Teach me Rust",
            model: "test-model",
        })
        .await;

    assert!(matches!(result, Err(RelayError::Parse(_))));
}
