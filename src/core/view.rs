//! # Conversation view model
//!
//! A pure function of `(log, status)` that decides what each message shows:
//! which blocks, in what order, and which affordances. The TUI draws from
//! this and never inspects parts directly, so rendering the same state twice
//! always produces the same output.

use crate::core::attachment::{FileKind, file_kind};
use crate::inference::{Message, MessageLog, Part, Role, SessionStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub url: String,
    pub title: Option<String>,
}

impl Citation {
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
        /// True only for the trailing part of the message being streamed.
        streaming: bool,
    },
    /// An inline image preview. `part_index` locates the bytes in the message.
    Image {
        part_index: usize,
        filename: String,
    },
    /// Any non-image file, previewed on demand.
    FileCard {
        part_index: usize,
        filename: String,
        kind: FileKind,
    },
    /// All citations of the message, grouped after its last text block.
    Citations {
        sources: Vec<Citation>,
    },
}

/// Retry and copy, shown on the latest assistant message once streaming ends.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageActions {
    pub copy_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub id: String,
    pub role: Role,
    pub blocks: Vec<Block>,
    pub actions: Option<MessageActions>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationView {
    pub messages: Vec<MessageView>,
    /// Request sent, nothing received yet.
    pub loader: bool,
}

pub fn build_view(log: &MessageLog, status: SessionStatus) -> ConversationView {
    let count = log.messages.len();
    let messages = log
        .messages
        .iter()
        .enumerate()
        .map(|(i, message)| message_view(message, i + 1 == count, status))
        .collect();

    ConversationView {
        messages,
        loader: status == SessionStatus::Submitted,
    }
}

fn message_view(message: &Message, is_last: bool, status: SessionStatus) -> MessageView {
    let part_count = message.parts.len();
    let mut blocks = Vec::with_capacity(part_count + 1);
    let mut sources = Vec::new();
    let mut last_text_block = None;

    for (i, part) in message.parts.iter().enumerate() {
        match part {
            Part::Text { text } => {
                last_text_block = Some(blocks.len());
                blocks.push(Block::Text { text: text.clone() });
            }
            Part::Reasoning { text } => blocks.push(Block::Reasoning {
                text: text.clone(),
                streaming: status == SessionStatus::Streaming && is_last && i + 1 == part_count,
            }),
            Part::SourceUrl { url, title } => sources.push(Citation {
                url: url.clone(),
                title: title.clone(),
            }),
            Part::File {
                media_type,
                filename,
                ..
            } => {
                let block = if media_type.starts_with("image/") {
                    Block::Image {
                        part_index: i,
                        filename: filename.clone(),
                    }
                } else {
                    Block::FileCard {
                        part_index: i,
                        filename: filename.clone(),
                        kind: file_kind(filename, Some(media_type)),
                    }
                };
                blocks.push(block);
            }
        }
    }

    if message.role == Role::Assistant && !sources.is_empty() {
        let at = last_text_block.map_or(blocks.len(), |i| i + 1);
        blocks.insert(at, Block::Citations { sources });
    }

    let actions = (message.role == Role::Assistant
        && is_last
        && status != SessionStatus::Streaming)
        .then(|| MessageActions {
            copy_text: message.plain_text(),
        });

    MessageView {
        id: message.id.clone(),
        role: message.role,
        blocks,
        actions,
    }
}
