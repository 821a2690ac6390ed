//! # Background jobs
//!
//! The async side of the session: each job awaits one slow operation and
//! reports back through the action channel. These functions are the only
//! code that awaits the relay or the attachment encoder; the reducer never
//! blocks.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::core::action::Action;
use crate::core::attachment::{Attachment, encode_attachments};
use crate::core::config::Limits;
use crate::core::state::App;
use crate::inference::{
    ChatRelay, ChatRequest, Message, RelayEvent, SuggestionRequest, ThinkingConfig,
};

/// Capacity of the provider → forwarder channel.
const EVENT_BUFFER: usize = 100;

/// A snapshot of everything one relay invocation needs.
pub struct RelayJob {
    pub relay: Arc<dyn ChatRelay>,
    pub generation: u64,
    pub messages: Vec<Message>,
    pub model: String,
    pub system_prompt: String,
    pub thinking: ThinkingConfig,
    pub search_grounding: bool,
}

impl App {
    /// Snapshots the log for the invocation just started by `update`.
    pub fn relay_job(&self) -> RelayJob {
        RelayJob {
            relay: self.relay.clone(),
            generation: self.generation,
            messages: self.log.messages.clone(),
            model: self.model_name.clone(),
            system_prompt: self.system_prompt.clone(),
            thinking: self.thinking,
            search_grounding: self.search_grounding,
        }
    }
}

/// Streams one assistant response, forwarding events in arrival order.
///
/// Always ends with exactly one `RelayFinished` or `RelayFailed`.
pub async fn run_relay_job(job: RelayJob, tx: mpsc::Sender<Action>) {
    let generation = job.generation;
    let attachments: usize = job.messages.iter().map(Message::attachment_count).sum();
    info!(
        "Relay {} via {}: model={}, messages={}, attachments={}",
        generation,
        job.relay.name(),
        job.model,
        job.messages.len(),
        attachments
    );

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<RelayEvent>(EVENT_BUFFER);
    let request = ChatRequest {
        messages: &job.messages,
        model: &job.model,
        system_prompt: &job.system_prompt,
        thinking: job.thinking,
        search_grounding: job.search_grounding,
    };

    let started = Instant::now();
    let stream = job.relay.stream_chat(request, event_tx);

    let forward_tx = tx.clone();
    let forward = async move {
        let mut forwarded = 0usize;
        while let Some(event) = event_rx.recv().await {
            if event == RelayEvent::Finished {
                debug!("Relay {} signalled finish", generation);
                continue;
            }
            forwarded += 1;
            if forward_tx.send(Action::Relay { generation, event }).is_err() {
                warn!("Failed to forward relay event: receiver dropped");
                break;
            }
        }
        forwarded
    };

    let (result, forwarded) = tokio::join!(stream, forward);
    let elapsed_ms = started.elapsed().as_millis();

    let outcome = match result {
        Ok(()) => {
            info!(
                "Relay {} finished: {} events in {}ms",
                generation, forwarded, elapsed_ms
            );
            Action::RelayFinished { generation }
        }
        Err(error) => {
            warn!(
                "Relay {} failed after {} events in {}ms: {}",
                generation, forwarded, elapsed_ms, error
            );
            Action::RelayFailed { generation, error }
        }
    };
    if tx.send(outcome).is_err() {
        warn!("Failed to send relay outcome: receiver dropped");
    }
}

/// Fetches follow-up questions. Failures are logged and produce no action.
pub async fn run_suggestion_job(
    relay: Arc<dyn ChatRelay>,
    prompt: String,
    model: String,
    generation: u64,
    tx: mpsc::Sender<Action>,
) {
    let request = SuggestionRequest {
        prompt: &prompt,
        model: &model,
    };
    match relay.suggest(request).await {
        Ok(suggestions) => {
            if tx
                .send(Action::SuggestionsReady {
                    generation,
                    suggestions,
                })
                .is_err()
            {
                warn!("Failed to send suggestions: receiver dropped");
            }
        }
        Err(e) => warn!("Suggestion request failed: {}", e),
    }
}

/// Encodes a submission's attachments and hands the result back to the reducer.
pub async fn run_encode_job(
    text: String,
    attachments: Vec<Attachment>,
    limits: Limits,
    tx: mpsc::Sender<Action>,
) {
    let result = encode_attachments(&attachments, &limits).await;
    if tx.send(Action::AttachmentsEncoded { text, result }).is_err() {
        warn!("Failed to send encoded attachments: receiver dropped");
    }
}
