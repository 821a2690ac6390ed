//! Google Gemini provider using `streamGenerateContent` over SSE.
//!
//! This module uses Gemini terminology:
//! - "contents" (the conversation), role "model" for the assistant
//! - "inlineData" for attached file bytes
//! - "thought" parts for reasoning, "groundingMetadata" for citations

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use super::{check_status, classify_error, emit, http_client};
use crate::inference::data_url::DataUrl;
use crate::inference::sse::{SseBody, SseFrame};
use crate::inference::suggestions::{parse_suggestions, suggestion_prompt, suggestion_schema};
use crate::inference::{
    ChatRelay, ChatRequest, Message, Part, RelayError, RelayEvent, Role, SuggestionRequest,
    ThinkingConfig,
};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<OutPart>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(untagged)]
enum OutPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    Remote {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
enum Tool {
    GoogleSearch {},
    UrlContext {},
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<serde_json::Value>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ThinkingWire {
    thinking_budget: u32,
    include_thoughts: bool,
}

/// One `data:` payload of the response stream.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<InPart>,
}

#[derive(Deserialize, Debug)]
struct InPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize, Debug)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Deserialize, Debug)]
struct WebSource {
    uri: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChunkError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// ============================================================================
// Translation Layer
// ============================================================================

/// Converts a file part into Gemini's inline or remote file reference.
fn file_to_part(media_type: &str, url: &str) -> Option<OutPart> {
    if let Some(data) = DataUrl::parse(url) {
        if !data.is_base64 {
            // Plain data URLs are text; send them as text.
            return Some(OutPart::Text {
                text: data.payload.to_string(),
            });
        }
        return Some(OutPart::Inline {
            inline_data: Blob {
                mime_type: media_type.to_string(),
                data: data.payload.to_string(),
            },
        });
    }
    if url.starts_with("https://") || url.starts_with("gs://") {
        return Some(OutPart::Remote {
            file_data: FileData {
                mime_type: media_type.to_string(),
                file_uri: url.to_string(),
            },
        });
    }
    warn!("Dropping file part with unsupported URL scheme ({})", media_type);
    None
}

/// Converts the message log into `systemInstruction` + `contents`.
///
/// Reasoning and citations are model output and are not sent back.
/// Messages that end up with no parts are skipped (Gemini rejects them).
fn log_to_contents(messages: &[Message], system_prompt: &str) -> (Option<Content>, Vec<Content>) {
    let mut system_texts: Vec<String> = Vec::new();
    if !system_prompt.trim().is_empty() {
        system_texts.push(system_prompt.to_string());
    }

    let mut contents = Vec::new();
    for message in messages {
        let role = match message.role {
            Role::System => {
                system_texts.push(message.plain_text());
                continue;
            }
            Role::User => "user",
            Role::Assistant => "model",
        };

        let parts: Vec<OutPart> = message
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } if !text.is_empty() => {
                    Some(OutPart::Text { text: text.clone() })
                }
                Part::File { media_type, url, .. } => file_to_part(media_type, url),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            debug!("Skipping empty {:?} message {}", message.role, message.id);
            continue;
        }
        contents.push(Content {
            role: Some(role),
            parts,
        });
    }

    let system_instruction = (!system_texts.is_empty()).then(|| Content {
        role: None,
        parts: vec![OutPart::Text {
            text: system_texts.join("\n\n"),
        }],
    });
    (system_instruction, contents)
}

fn thinking_to_wire(thinking: ThinkingConfig) -> ThinkingWire {
    ThinkingWire {
        thinking_budget: thinking.budget,
        include_thoughts: thinking.include_thoughts,
    }
}

/// Parses one SSE frame into relay events, in the order the parts appear.
///
/// Malformed frames are logged and dropped; an in-stream error object fails the stream.
fn frame_to_events(frame: &SseFrame) -> Result<Vec<RelayEvent>, RelayError> {
    if frame.is_done_marker() {
        return Ok(Vec::new());
    }
    let chunk: StreamChunk = match serde_json::from_str(&frame.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Dropping malformed Gemini frame ({}): {}", e, frame.data);
            return Ok(Vec::new());
        }
    };

    if let Some(err) = chunk.error {
        warn!(
            "Gemini in-stream error: code={:?} status={:?} message={}",
            err.code, err.status, err.message
        );
        let body = serde_json::json!({
            "error": { "message": err.message, "status": err.status }
        });
        return Err(classify_error(err.code.unwrap_or(500), &body.to_string()));
    }

    let mut events = Vec::new();
    for candidate in chunk.candidates {
        if let Some(content) = candidate.content {
            for part in content.parts {
                let Some(text) = part.text.filter(|t| !t.is_empty()) else {
                    continue;
                };
                events.push(if part.thought {
                    RelayEvent::ReasoningDelta(text)
                } else {
                    RelayEvent::TextDelta(text)
                });
            }
        }
        if let Some(grounding) = candidate.grounding_metadata {
            for chunk in grounding.grounding_chunks {
                if let Some(web) = chunk.web {
                    events.push(RelayEvent::Source {
                        url: web.uri,
                        title: web.title,
                    });
                }
            }
        }
        if let Some(reason) = candidate.finish_reason {
            debug!("Gemini finish reason: {}", reason);
            if reason != "STOP" && reason != "MAX_TOKENS" {
                warn!("Gemini stopped early: {}", reason);
            }
        }
    }
    Ok(events)
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Gemini API relay (the hosted model the chat forwards to by default).
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Creates a new Gemini provider.
    ///
    /// # Arguments
    /// * `api_key` - Google AI Studio API key
    /// * `base_url` - Optional custom base URL (defaults to the public v1beta endpoint)
    /// * `max_duration` - Upper bound on a single request, streaming included
    pub fn new(api_key: String, base_url: Option<String>, max_duration: Duration) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            client: http_client(max_duration),
        }
    }

    /// Opens a `streamGenerateContent` SSE stream for `model`.
    async fn open_stream(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<SseBody, RelayError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            model
        );
        debug!(
            "Gemini request body: {} bytes",
            serde_json::to_vec(request).map(|b| b.len()).unwrap_or(0)
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        debug!("Gemini response status: {}", response.status());
        let response = check_status(response, "Gemini").await?;
        Ok(SseBody::new(response))
    }
}

#[async_trait]
impl ChatRelay for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream_chat(
        &self,
        request: ChatRequest<'_>,
        sender: Sender<RelayEvent>,
    ) -> Result<(), RelayError> {
        let (system_instruction, contents) =
            log_to_contents(request.messages, request.system_prompt);
        let tools = if request.search_grounding {
            vec![Tool::UrlContext {}, Tool::GoogleSearch {}]
        } else {
            Vec::new()
        };

        let body = GenerateRequest {
            contents,
            system_instruction,
            tools,
            generation_config: GenerationConfig {
                thinking_config: Some(thinking_to_wire(request.thinking)),
                ..Default::default()
            },
        };

        info!(
            "Gemini request: model={}, contents={}, grounding={}",
            request.model,
            body.contents.len(),
            request.search_grounding
        );

        let mut stream = self.open_stream(request.model, &body).await?;
        let mut event_count = 0usize;
        let mut text_len = 0usize;

        while let Some(frames) = stream.next_frames().await? {
            for frame in frames {
                for event in frame_to_events(&frame)? {
                    event_count += 1;
                    if let RelayEvent::TextDelta(ref t) = event {
                        text_len += t.len();
                    }
                    emit(&sender, event).await?;
                }
            }
        }

        info!(
            "Gemini stream complete: {} events, {} text bytes",
            event_count, text_len
        );
        emit(&sender, RelayEvent::Finished).await
    }

    async fn suggest(&self, request: SuggestionRequest<'_>) -> Result<Vec<String>, RelayError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![OutPart::Text {
                    text: suggestion_prompt(request.prompt),
                }],
            }],
            system_instruction: None,
            tools: Vec::new(),
            generation_config: GenerationConfig {
                response_mime_type: Some("application/json"),
                response_json_schema: Some(suggestion_schema()),
                ..Default::default()
            },
        };

        info!("Gemini suggestion request: model={}", request.model);
        let mut stream = self.open_stream(request.model, &body).await?;
        let mut raw = String::new();
        while let Some(frames) = stream.next_frames().await? {
            for frame in frames {
                for event in frame_to_events(&frame)? {
                    if let RelayEvent::TextDelta(text) = event {
                        raw.push_str(&text);
                    }
                }
            }
        }
        debug!("Gemini suggestions raw: {}", raw);
        parse_suggestions(&raw)
    }
}
