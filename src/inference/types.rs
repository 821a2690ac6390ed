use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message. Serialized with the wire names the relay expects.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One typed fragment of a message.
///
/// Parts are stored in stream arrival order and never reordered. Only the
/// trailing `Text` or `Reasoning` part of the message currently being
/// streamed is ever extended in place.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    SourceUrl {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    File {
        #[serde(rename = "mediaType")]
        media_type: String,
        filename: String,
        /// Self-contained `data:` URL (or a remote reference for replayed logs).
        url: String,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Part::File { .. })
    }
}

/// A single turn in the conversation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<Part>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            parts,
            created_at: Utc::now(),
        }
    }

    /// A user turn: the text part first, then file parts in attachment order.
    pub fn user(text: impl Into<String>, files: Vec<Part>) -> Self {
        let mut parts = Vec::with_capacity(files.len() + 1);
        parts.push(Part::text(text));
        parts.extend(files);
        Self::new(Role::User, parts)
    }

    pub fn assistant() -> Self {
        Self::new(Role::Assistant, Vec::new())
    }

    /// All text parts joined by a single space (what "copy" puts on the clipboard).
    pub fn plain_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn attachment_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_file()).count()
    }

    /// Extends the trailing text part, or appends a new one.
    pub fn append_text(&mut self, delta: &str) {
        if let Some(Part::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
            return;
        }
        self.parts.push(Part::text(delta));
    }

    /// Extends the trailing reasoning part, or appends a new one.
    pub fn append_reasoning(&mut self, delta: &str) {
        if let Some(Part::Reasoning { text }) = self.parts.last_mut() {
            text.push_str(delta);
            return;
        }
        self.parts.push(Part::Reasoning {
            text: delta.to_string(),
        });
    }

    /// Appends a citation unless this message already cites the same URL.
    /// Returns false for the duplicate.
    pub fn add_source(&mut self, url: String, title: Option<String>) -> bool {
        let duplicate = self
            .parts
            .iter()
            .any(|p| matches!(p, Part::SourceUrl { url: existing, .. } if *existing == url));
        if duplicate {
            return false;
        }
        self.parts.push(Part::SourceUrl { url, title });
        true
    }
}

/// The ordered conversation. Messages are only appended, except that
/// regeneration drops the trailing assistant turn before streaming its replacement.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageLog {
    pub messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) -> &mut Message {
        self.messages.push(message);
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the most recent user turn (used as the suggestion prompt).
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(Message::plain_text)
    }

    /// Removes the trailing assistant message, returning it.
    /// Leaves the log untouched if the last message is not from the assistant.
    pub fn pop_assistant(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(m) if m.role == Role::Assistant => self.messages.pop(),
            _ => None,
        }
    }
}

/// The single enumerated value describing the relay lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    /// Request sent, nothing streamed back yet.
    Submitted,
    Streaming,
    Error,
}

impl SessionStatus {
    /// True while a relay invocation is outstanding.
    pub fn is_busy(self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::Streaming)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Idle => "ready",
            SessionStatus::Submitted => "waiting",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Error => "error",
        }
    }
}

/// Thinking-token settings forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingConfig {
    pub budget: u32,
    pub include_thoughts: bool,
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        Self {
            budget: 8192,
            include_thoughts: true,
        }
    }
}

/// One incremental event from the relay, delivered in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    TextDelta(String),
    ReasoningDelta(String),
    Source { url: String, title: Option<String> },
    /// Provider signalled end of response.
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_puts_text_before_files() {
        let file = Part::File {
            media_type: "image/png".to_string(),
            filename: "a.png".to_string(),
            url: "data:image/png;base64,AA==".to_string(),
        };
        let msg = Message::user("Hello", vec![file.clone()]);
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.parts, vec![Part::text("Hello"), file]);
        assert_eq!(msg.attachment_count(), 1);
    }

    #[test]
    fn test_append_text_extends_trailing_text_only() {
        let mut msg = Message::assistant();
        msg.append_reasoning("thinking");
        msg.append_reasoning(" more");
        msg.append_text("Hel");
        msg.append_text("lo");
        assert_eq!(
            msg.parts,
            vec![
                Part::Reasoning {
                    text: "thinking more".to_string()
                },
                Part::text("Hello"),
            ]
        );
    }

    #[test]
    fn test_text_after_source_starts_new_part() {
        let mut msg = Message::assistant();
        msg.append_text("a");
        msg.add_source("https://example.com".to_string(), None);
        msg.append_text("b");
        assert_eq!(msg.parts.len(), 3);
        assert_eq!(msg.plain_text(), "a b");
    }

    #[test]
    fn test_duplicate_source_is_dropped() {
        let mut msg = Message::assistant();
        assert!(msg.add_source("https://rust-lang.org".to_string(), None));
        assert!(!msg.add_source("https://rust-lang.org".to_string(), Some("Rust".to_string())));
        assert_eq!(msg.parts.len(), 1);
    }

    #[test]
    fn test_pop_assistant_only_pops_assistant() {
        let mut log = MessageLog::new();
        log.push(Message::user("hi", vec![]));
        assert!(log.pop_assistant().is_none());
        assert_eq!(log.len(), 1);

        log.push(Message::assistant());
        assert!(log.pop_assistant().is_some());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_part_serializes_with_wire_tags() {
        let part = Part::File {
            media_type: "application/pdf".to_string(),
            filename: "doc.pdf".to_string(),
            url: "data:application/pdf;base64,".to_string(),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains(r#""type":"file""#));
        assert!(json.contains(r#""mediaType":"application/pdf""#));

        let source = serde_json::to_string(&Part::SourceUrl {
            url: "https://a.b".to_string(),
            title: None,
        })
        .unwrap();
        assert_eq!(source, r#"{"type":"source-url","url":"https://a.b"}"#);
    }

    #[test]
    fn test_status_busy() {
        assert!(!SessionStatus::Idle.is_busy());
        assert!(SessionStatus::Submitted.is_busy());
        assert!(SessionStatus::Streaming.is_busy());
        assert!(!SessionStatus::Error.is_busy());
    }

    #[test]
    fn test_last_user_text() {
        let mut log = MessageLog::new();
        assert_eq!(log.last_user_text(), None);
        log.push(Message::user("first", vec![]));
        log.push(Message::assistant());
        log.push(Message::user("second", vec![]));
        assert_eq!(log.last_user_text().as_deref(), Some("second"));
    }
}
