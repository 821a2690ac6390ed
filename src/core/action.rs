//! # Actions
//!
//! Everything that can happen in Lumen becomes an `Action`.
//! User presses Enter? That's `Action::Submit { .. }`.
//! The relay streams a token? That's `Action::Relay { generation, event }`.
//!
//! The `update()` function takes the current state and an action, mutates
//! the state, and returns an `Effect` describing the I/O the adapter must
//! perform. No side effects happen here.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```
//!
//! ## Session lifecycle
//!
//! ```text
//! idle ──submit──▶ submitted ──first event──▶ streaming ──finished──▶ idle
//!   ▲                  │                          │
//!   │                  └──────────failed──────────┴──────▶ error
//!   └────────────────────────stop──────────────────────────────┘
//! ```
//!
//! Every relay invocation is tagged with a fresh `generation`. Stop and
//! regenerate bump it, so events that arrive from an aborted or replaced
//! stream are dropped instead of corrupting the log.

use log::{debug, error, info, warn};

use crate::core::attachment::{Attachment, AttachmentError};
use crate::core::state::App;
use crate::inference::{Message, Part, RelayError, RelayEvent, SessionStatus};

#[derive(Debug)]
pub enum Action {
    /// The user submitted the draft. Attachments are encoded first if present.
    Submit {
        text: String,
        attachments: Vec<Attachment>,
    },
    /// Encoding finished for a pending submission.
    AttachmentsEncoded {
        text: String,
        result: Result<Vec<Part>, AttachmentError>,
    },
    Regenerate,
    /// Abort the in-flight stream, keeping whatever already arrived.
    Stop,
    Relay {
        generation: u64,
        event: RelayEvent,
    },
    RelayFinished {
        generation: u64,
    },
    RelayFailed {
        generation: u64,
        error: RelayError,
    },
    SuggestionsReady {
        generation: u64,
        suggestions: Vec<String>,
    },
    DismissError,
    Quit,
}

/// I/O the adapter performs after an update.
#[derive(Debug, PartialEq)]
pub enum Effect {
    None,
    /// Encode these attachments off the UI thread. The input is kept until
    /// encoding succeeds.
    EncodeAttachments {
        text: String,
        attachments: Vec<Attachment>,
    },
    /// Reset the input and start a relay invocation for the current log.
    SendMessage,
    /// Start a relay invocation for the current log (input untouched).
    SpawnRequest,
    /// Abort the in-flight relay task.
    AbortRequest,
    FetchSuggestions {
        prompt: String,
    },
    /// Show a transient warning to the user.
    Warn(String),
    Quit,
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::Submit { text, attachments } => submit(app, text, attachments),

        Action::AttachmentsEncoded { text, result } => {
            app.encoding = false;
            match result {
                Ok(files) => {
                    info!("Attachments encoded: {} file part(s)", files.len());
                    app.log.push(Message::user(text, files));
                    begin_invocation(app);
                    Effect::SendMessage
                }
                Err(e) => {
                    warn!("Attachment encoding failed: {}", e);
                    app.status_message = String::from("Attachment failed");
                    Effect::Warn(e.to_string())
                }
            }
        }

        Action::Regenerate => {
            if !app.can_regenerate() {
                debug!(
                    "Regenerate ignored: status={:?}, last role={:?}",
                    app.status,
                    app.log.last().map(|m| m.role)
                );
                return Effect::None;
            }
            if let Some(old) = app.log.pop_assistant() {
                info!("Regenerating assistant message {}", old.id);
            }
            begin_invocation(app);
            Effect::SpawnRequest
        }

        Action::Stop => {
            if !app.status.is_busy() {
                return Effect::None;
            }
            info!("Stopping generation {}", app.generation);
            app.generation += 1;
            app.status = SessionStatus::Idle;
            app.current_response = None;
            app.status_message = String::from("Stopped");
            Effect::AbortRequest
        }

        Action::Relay { generation, event } => {
            if !is_current(app, generation) {
                return Effect::None;
            }
            apply_event(app, event);
            Effect::None
        }

        Action::RelayFinished { generation } => {
            if !is_current(app, generation) {
                return Effect::None;
            }
            finish(app)
        }

        Action::RelayFailed { generation, error } => {
            if !is_current(app, generation) {
                warn!("Dropping stale failure from generation {}: {}", generation, error);
                return Effect::None;
            }
            error!("Relay failed (generation {}): {}", generation, error);
            app.status = SessionStatus::Error;
            app.error = Some(error.user_message().to_string());
            app.current_response = None;
            app.status_message = String::from("Error");
            Effect::None
        }

        Action::SuggestionsReady {
            generation,
            suggestions,
        } => {
            if generation == app.generation && !app.is_busy() {
                debug!("Suggestions ready: {:?}", suggestions);
                app.suggestions = suggestions;
            }
            Effect::None
        }

        Action::DismissError => {
            if app.status == SessionStatus::Error {
                app.status = SessionStatus::Idle;
            }
            app.error = None;
            Effect::None
        }

        Action::Quit => Effect::Quit,
    }
}

fn submit(app: &mut App, text: String, attachments: Vec<Attachment>) -> Effect {
    if text.trim().is_empty() {
        debug!("Submit ignored: empty draft ({} attachment(s))", attachments.len());
        return Effect::None;
    }
    if !app.can_submit() {
        warn!(
            "Submit rejected: status={:?}, encoding={}",
            app.status, app.encoding
        );
        return Effect::None;
    }

    if attachments.is_empty() {
        app.log.push(Message::user(text, Vec::new()));
        begin_invocation(app);
        return Effect::SendMessage;
    }

    info!("Encoding {} attachment(s) before submit", attachments.len());
    app.encoding = true;
    app.error = None;
    app.status_message = String::from("Encoding attachments...");
    Effect::EncodeAttachments { text, attachments }
}

/// Starts a new relay invocation for the log as it stands.
fn begin_invocation(app: &mut App) {
    app.generation += 1;
    app.status = SessionStatus::Submitted;
    app.error = None;
    app.suggestions.clear();
    app.current_response = None;
    app.status_message = String::from("Thinking...");
    info!(
        "Relay invocation {}: {} message(s) in log",
        app.generation,
        app.log.len()
    );
}

/// Events from a replaced or stopped invocation, or after it resolved, are dropped.
fn is_current(app: &App, generation: u64) -> bool {
    if generation != app.generation {
        debug!(
            "Dropping event from stale generation {} (current {})",
            generation, app.generation
        );
        return false;
    }
    if !app.status.is_busy() {
        debug!("Dropping event for resolved generation {}", generation);
        return false;
    }
    true
}

fn apply_event(app: &mut App, event: RelayEvent) {
    if event == RelayEvent::Finished {
        // The driver follows every stream with RelayFinished.
        return;
    }

    let message = response_message(app);
    match event {
        RelayEvent::TextDelta(delta) => message.append_text(&delta),
        RelayEvent::ReasoningDelta(delta) => message.append_reasoning(&delta),
        RelayEvent::Source { url, title } => {
            if !message.add_source(url.clone(), title) {
                debug!("Dropping duplicate source {}", url);
            }
        }
        RelayEvent::Finished => {}
    }
}

/// The assistant message receiving the stream, created on the first event.
fn response_message(app: &mut App) -> &mut Message {
    if app.status == SessionStatus::Submitted {
        app.status = SessionStatus::Streaming;
        app.status_message = String::from("Streaming...");
    }

    let index = app
        .current_response
        .as_deref()
        .and_then(|id| app.log.messages.iter().rposition(|m| m.id == id));
    match index {
        Some(index) => &mut app.log.messages[index],
        None => {
            let message = app.log.push(Message::assistant());
            app.current_response = Some(message.id.clone());
            message
        }
    }
}

fn finish(app: &mut App) -> Effect {
    if app.current_response.is_none() {
        debug!("Stream finished with no parts; appending empty assistant message");
        app.log.push(Message::assistant());
    }
    app.status = SessionStatus::Idle;
    app.current_response = None;
    app.status_message = String::from("Ready");
    info!("Relay invocation {} complete", app.generation);

    if !app.suggestions_enabled {
        return Effect::None;
    }
    match app.log.last_user_text() {
        Some(prompt) if !prompt.trim().is_empty() => Effect::FetchSuggestions { prompt },
        _ => Effect::None,
    }
}
