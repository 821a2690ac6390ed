//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::core::state::App;
use crate::inference::{
    ChatRelay, ChatRequest, Message, RelayError, RelayEvent, SuggestionRequest,
};

/// One scripted step of a fake stream.
#[derive(Debug)]
pub enum Step {
    Event(RelayEvent),
    Fail(RelayError),
}

/// A relay that replays scripted streams, one script per call.
///
/// Calls past the last script stream nothing and succeed.
#[derive(Default)]
pub struct ScriptedRelay {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    suggestions: Option<Vec<String>>,
    /// The message log each `stream_chat` call received.
    pub calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedRelay {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::from([steps])),
            ..Default::default()
        }
    }

    /// Queues the script for the following call.
    pub fn then(self, steps: Vec<Step>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push_back(steps);
        }
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<&str>) -> Self {
        self.suggestions = Some(suggestions.into_iter().map(str::to_string).collect());
        self
    }
}

#[async_trait]
impl ChatRelay for ScriptedRelay {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(
        &self,
        request: ChatRequest<'_>,
        sender: Sender<RelayEvent>,
    ) -> Result<(), RelayError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.messages.to_vec());
        }
        let steps = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_default();
        for step in steps {
            match step {
                Step::Event(event) => sender
                    .send(event)
                    .await
                    .map_err(|_| RelayError::ChannelClosed)?,
                Step::Fail(error) => return Err(error),
            }
        }
        Ok(())
    }

    async fn suggest(&self, _request: SuggestionRequest<'_>) -> Result<Vec<String>, RelayError> {
        self.suggestions
            .clone()
            .ok_or_else(|| RelayError::Parse("no suggestions scripted".to_string()))
    }
}

/// Creates a test App with an empty scripted relay.
pub fn test_app() -> App {
    App::new(Arc::new(ScriptedRelay::default()), "test-model".to_string())
}
