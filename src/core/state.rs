//! # Application State
//!
//! Core business state for Lumen. This module contains domain logic only -
//! no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── relay: Arc<dyn ChatRelay>     // hosted model
//! ├── log: MessageLog               // conversation history
//! ├── status: SessionStatus         // idle / submitted / streaming / error
//! ├── error: Option<String>         // user-facing failure text
//! ├── status_message: String        // status bar text
//! ├── model_name: String            // current model
//! ├── generation: u64               // id of the current relay invocation
//! ├── encoding: bool                // attachments being encoded
//! ├── current_response: Option<id>  // assistant message being streamed
//! └── suggestions: Vec<String>      // follow-up questions for the last turn
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.
//! This keeps things predictable, so no surprise mutations.

use std::sync::Arc;

use crate::core::config::ResolvedConfig;
use crate::inference::{ChatRelay, MessageLog, SessionStatus, ThinkingConfig};

pub const WELCOME_STATUS: &str = "Welcome to Lumen!";

pub struct App {
    pub relay: Arc<dyn ChatRelay>,
    pub log: MessageLog,
    pub status: SessionStatus,
    pub error: Option<String>,
    pub status_message: String,
    pub model_name: String,
    pub system_prompt: String,
    pub thinking: ThinkingConfig,
    pub search_grounding: bool,
    pub suggestions_enabled: bool,
    /// Follow-up questions for the most recent completed turn.
    pub suggestions: Vec<String>,
    /// Bumped on every relay invocation and on Stop; events from older
    /// invocations are dropped.
    pub generation: u64,
    /// True while a submission's attachments are being encoded.
    pub encoding: bool,
    /// Id of the assistant message the current stream appends to.
    pub current_response: Option<String>,
}

impl App {
    pub fn new(relay: Arc<dyn ChatRelay>, model_name: String) -> Self {
        Self {
            relay,
            log: MessageLog::new(),
            status: SessionStatus::Idle,
            error: None,
            status_message: String::from(WELCOME_STATUS),
            model_name,
            system_prompt: String::new(),
            thinking: ThinkingConfig::default(),
            search_grounding: false,
            suggestions_enabled: false,
            suggestions: Vec::new(),
            generation: 0,
            encoding: false,
            current_response: None,
        }
    }

    pub fn from_config(relay: Arc<dyn ChatRelay>, config: &ResolvedConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            thinking: config.thinking,
            search_grounding: config.search_grounding,
            suggestions_enabled: config.suggestions,
            ..Self::new(relay, config.model_name.clone())
        }
    }

    /// A relay call or attachment encode is outstanding.
    pub fn is_busy(&self) -> bool {
        self.encoding || self.status.is_busy()
    }

    pub fn can_submit(&self) -> bool {
        !self.is_busy()
    }

    /// Regenerate needs a trailing assistant message and no stream in flight.
    pub fn can_regenerate(&self) -> bool {
        !self.is_busy()
            && self
                .log
                .last()
                .is_some_and(|m| m.role == crate::inference::Role::Assistant)
    }
}
