//! OpenRouter provider implementation using the Responses API.
//!
//! This module uses OpenAI Responses API terminology:
//! - "input" (array of messages), "input_text" / "input_image" / "input_file" content
//! - SSE events: response.output_text.delta, response.reasoning_text.delta,
//!   response.output_text.annotation.added

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use super::{check_status, classify_error, emit, http_client};
use crate::inference::sse::{SseBody, SseFrame};
use crate::inference::suggestions::{parse_suggestions, suggestion_prompt, suggestion_schema};
use crate::inference::{
    ChatRelay, ChatRequest, Message, Part, RelayError, RelayEvent, Role, SuggestionRequest,
    ThinkingConfig,
};

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

// ============================================================================
// OpenRouter Responses API Types
// ============================================================================

/// Role in an input message (OpenAI terminology)
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
enum WireRole {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename = "message")]
struct InputMessage {
    role: WireRole,
    content: MessageContent,
}

/// User turns carry typed content; system and assistant turns are plain strings.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<InputContent>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent {
    InputText { text: String },
    InputImage { image_url: String, detail: &'static str },
    InputFile { filename: String, file_data: String },
}

/// Configuration for reasoning tokens
#[derive(Serialize, Debug)]
struct Reasoning {
    enabled: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    exclude: bool,
}

#[derive(Serialize, Debug)]
struct Plugin {
    id: &'static str,
}

#[derive(Serialize, Debug)]
struct TextConfig {
    format: TextFormat,
}

#[derive(Serialize, Debug)]
struct TextFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

/// The request body for the Responses API
#[derive(Serialize, Debug)]
struct ResponsesRequest {
    model: String,
    input: Vec<InputMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<Reasoning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    plugins: Vec<Plugin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig>,
}

/// Generic SSE event wrapper to extract the type field.
/// OpenRouter embeds the event type inside the JSON, not always in `event:` lines.
#[derive(Deserialize, Debug)]
struct SseEvent {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    delta: String,
}

#[derive(Deserialize, Debug)]
struct AnnotationAddedEvent {
    annotation: Annotation,
}

#[derive(Deserialize, Debug)]
struct Annotation {
    #[serde(rename = "type")]
    annotation_type: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
}

/// `error` events and `response.failed` carry the failure in different places.
#[derive(Deserialize, Debug, Default)]
struct ErrorEvent {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<FailedResponse>,
}

#[derive(Deserialize, Debug)]
struct FailedResponse {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

/// Converts an empty string to None, non-empty to Some.
fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

// ============================================================================
// Translation Layer
// ============================================================================

fn file_to_content(media_type: &str, filename: &str, url: &str) -> InputContent {
    if media_type.starts_with("image/") {
        InputContent::InputImage {
            image_url: url.to_string(),
            detail: "auto",
        }
    } else {
        InputContent::InputFile {
            filename: filename.to_string(),
            file_data: url.to_string(),
        }
    }
}

/// Converts the message log into Responses API input.
///
/// Reasoning and source parts are model output and are filtered out.
/// Messages with nothing left to send are skipped.
fn log_to_input(messages: &[Message]) -> Vec<InputMessage> {
    messages
        .iter()
        .filter_map(|message| match message.role {
            Role::User => {
                let parts: Vec<InputContent> = message
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        Part::Text { text } if !text.is_empty() => {
                            Some(InputContent::InputText { text: text.clone() })
                        }
                        Part::File {
                            media_type,
                            filename,
                            url,
                        } => Some(file_to_content(media_type, filename, url)),
                        _ => None,
                    })
                    .collect();
                (!parts.is_empty()).then(|| InputMessage {
                    role: WireRole::User,
                    content: MessageContent::Parts(parts),
                })
            }
            Role::Assistant | Role::System => {
                let text = message
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        Part::Text { text } if !text.is_empty() => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let role = if message.role == Role::System {
                    WireRole::System
                } else {
                    WireRole::Assistant
                };
                (!text.is_empty()).then(|| InputMessage {
                    role,
                    content: MessageContent::Text(text),
                })
            }
        })
        .collect()
}

fn thinking_to_reasoning(thinking: ThinkingConfig) -> Reasoning {
    Reasoning {
        enabled: thinking.budget > 0,
        max_tokens: thinking.budget,
        exclude: !thinking.include_thoughts,
    }
}

fn code_to_status(code: Option<&serde_json::Value>) -> u16 {
    match code {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(serde_json::Value::String(s)) if s == "rate_limit_exceeded" => Some(429),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .unwrap_or(500)
}

/// What a single frame means for the stream.
#[derive(Debug, PartialEq)]
enum FrameOutcome {
    Events(Vec<RelayEvent>),
    Completed,
}

/// Interprets one SSE frame. Unknown and malformed frames are logged and skipped.
fn frame_to_outcome(frame: &SseFrame) -> Result<FrameOutcome, RelayError> {
    if frame.is_done_marker() {
        debug!("Received [DONE] marker");
        return Ok(FrameOutcome::Events(Vec::new()));
    }
    let data = frame.data.as_str();
    let event_type = frame.event.clone().or_else(|| {
        serde_json::from_str::<SseEvent>(data)
            .ok()
            .map(|e| e.event_type)
    });

    debug!("SSE data for event {:?}: {} bytes", event_type, data.len());

    let events = match event_type.as_deref() {
        Some("response.output_text.delta") => match serde_json::from_str::<SseEvent>(data) {
            Ok(event) if !event.delta.is_empty() => vec![RelayEvent::TextDelta(event.delta)],
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!("Dropping malformed text delta ({}): {}", e, data);
                Vec::new()
            }
        },
        Some("response.reasoning_summary_text.delta") | Some("response.reasoning_text.delta") => {
            match serde_json::from_str::<SseEvent>(data) {
                Ok(event) if !event.delta.is_empty() => {
                    vec![RelayEvent::ReasoningDelta(event.delta)]
                }
                Ok(_) => Vec::new(),
                Err(e) => {
                    warn!("Dropping malformed reasoning delta ({}): {}", e, data);
                    Vec::new()
                }
            }
        }
        Some("response.output_text.annotation.added") => {
            match serde_json::from_str::<AnnotationAddedEvent>(data) {
                Ok(event)
                    if event.annotation.annotation_type == "url_citation"
                        && !event.annotation.url.is_empty() =>
                {
                    vec![RelayEvent::Source {
                        url: event.annotation.url,
                        title: non_empty(event.annotation.title),
                    }]
                }
                Ok(event) => {
                    debug!("Ignoring annotation type '{}'", event.annotation.annotation_type);
                    Vec::new()
                }
                Err(e) => {
                    warn!("Dropping malformed annotation ({}): {}", e, data);
                    Vec::new()
                }
            }
        }
        Some("response.completed") => {
            debug!("response.completed data: {}", data);
            return Ok(FrameOutcome::Completed);
        }
        Some("response.failed") | Some("error") => {
            let event: ErrorEvent = serde_json::from_str(data).unwrap_or_default();
            let (code, message) = match event.response.and_then(|r| r.error) {
                Some(detail) => (detail.code, detail.message),
                None => (event.code, event.message.unwrap_or_default()),
            };
            let status = code_to_status(code.as_ref());
            warn!("OpenRouter stream error: status={} message={}", status, message);
            let body = serde_json::json!({ "error": { "message": message } });
            return Err(classify_error(status, &body.to_string()));
        }
        Some(other) => {
            // response.created, response.in_progress, output_item.added, etc.
            debug!("Ignoring event type '{}': {} bytes", other, data.len());
            Vec::new()
        }
        None => {
            warn!("Could not parse event type from data: {}", data);
            Vec::new()
        }
    };
    Ok(FrameOutcome::Events(events))
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// OpenRouter API provider using Responses API
pub struct OpenRouterProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    /// Creates a new OpenRouter provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenRouter API key
    /// * `base_url` - Optional custom base URL (defaults to OpenRouter's API)
    /// * `max_duration` - Upper bound on a single request, streaming included
    pub fn new(api_key: String, base_url: Option<String>, max_duration: Duration) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            client: http_client(max_duration),
        }
    }

    /// Sends a request to the Responses endpoint and returns the SSE body.
    async fn send_request(&self, request: &ResponsesRequest) -> Result<SseBody, RelayError> {
        let json_body = serde_json::to_string(request)
            .map_err(|e| RelayError::Parse(format!("Request serialization failed: {e}")))?;
        debug!("OpenRouter request body: {} bytes", json_body.len());

        let response = self
            .client
            .post(format!("{}/responses", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .body(json_body)
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        debug!("OpenRouter response status: {}", response.status());
        let response = check_status(response, "OpenRouter").await?;
        Ok(SseBody::new(response))
    }
}

#[async_trait]
impl ChatRelay for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn stream_chat(
        &self,
        request: ChatRequest<'_>,
        sender: Sender<RelayEvent>,
    ) -> Result<(), RelayError> {
        let plugins = if request.search_grounding {
            vec![Plugin { id: "web" }]
        } else {
            Vec::new()
        };
        let responses_request = ResponsesRequest {
            model: request.model.to_string(),
            input: log_to_input(request.messages),
            stream: true,
            instructions: non_empty(Some(request.system_prompt.to_string())),
            reasoning: Some(thinking_to_reasoning(request.thinking)),
            plugins,
            text: None,
        };

        info!(
            "OpenRouter Responses API request: model={}, input_count={}, grounding={}",
            request.model,
            responses_request.input.len(),
            request.search_grounding,
        );

        let mut stream = self.send_request(&responses_request).await?;
        let mut chunk_count = 0usize;
        let mut total_content_len = 0usize;

        while let Some(frames) = stream.next_frames().await? {
            for frame in frames {
                match frame_to_outcome(&frame)? {
                    FrameOutcome::Events(events) => {
                        for event in events {
                            chunk_count += 1;
                            if let RelayEvent::TextDelta(ref t) = event {
                                total_content_len += t.len();
                            }
                            emit(&sender, event).await?;
                        }
                    }
                    FrameOutcome::Completed => {
                        info!(
                            "Stream complete: {} chunks, {} content bytes",
                            chunk_count, total_content_len
                        );
                        return emit(&sender, RelayEvent::Finished).await;
                    }
                }
            }
        }

        // Body ended without response.completed; keep what arrived.
        warn!(
            "Stream ended without completion event: {} chunks, {} content bytes",
            chunk_count, total_content_len
        );
        emit(&sender, RelayEvent::Finished).await
    }

    async fn suggest(&self, request: SuggestionRequest<'_>) -> Result<Vec<String>, RelayError> {
        let responses_request = ResponsesRequest {
            model: request.model.to_string(),
            input: vec![InputMessage {
                role: WireRole::User,
                content: MessageContent::Text(suggestion_prompt(request.prompt)),
            }],
            stream: true,
            instructions: None,
            reasoning: None,
            plugins: Vec::new(),
            text: Some(TextConfig {
                format: TextFormat {
                    format_type: "json_schema",
                    name: "suggestions",
                    strict: true,
                    schema: suggestion_schema(),
                },
            }),
        };

        info!("OpenRouter suggestion request: model={}", request.model);
        let mut stream = self.send_request(&responses_request).await?;
        let mut raw = String::new();
        'frames: while let Some(frames) = stream.next_frames().await? {
            for frame in frames {
                match frame_to_outcome(&frame)? {
                    FrameOutcome::Events(events) => {
                        for event in events {
                            if let RelayEvent::TextDelta(text) = event {
                                raw.push_str(&text);
                            }
                        }
                    }
                    FrameOutcome::Completed => break 'frames,
                }
            }
        }
        debug!("OpenRouter suggestions raw: {}", raw);
        parse_suggestions(&raw)
    }
}
