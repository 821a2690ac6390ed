use std::sync::{Arc, Mutex, mpsc};

use async_trait::async_trait;
use lumen::core::action::{Action, Effect, update};
use lumen::core::attachment::{Attachment, AttachmentError};
use lumen::core::config::Limits;
use lumen::core::input::{InputController, ValidationError};
use lumen::core::relay_task::{run_encode_job, run_relay_job};
use lumen::core::state::App;
use lumen::inference::{
    ChatRelay, ChatRequest, Part, RATE_LIMIT_MESSAGE, RelayError, RelayEvent, Role,
    SessionStatus, SuggestionRequest,
};
use tokio::sync::mpsc::Sender;

// ============================================================================
// Fake relay
// ============================================================================

/// Replays one scripted response per invocation, in order.
struct FakeRelay {
    replies: Mutex<Vec<Reply>>,
}

struct Reply {
    events: Vec<RelayEvent>,
    failure: Option<RelayError>,
}

impl Reply {
    fn text(chunks: &[&str]) -> Self {
        Self {
            events: chunks
                .iter()
                .map(|c| RelayEvent::TextDelta(c.to_string()))
                .collect(),
            failure: None,
        }
    }

    fn failing(chunks: &[&str], error: RelayError) -> Self {
        Self {
            failure: Some(error),
            ..Self::text(chunks)
        }
    }
}

impl FakeRelay {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
        })
    }
}

#[async_trait]
impl ChatRelay for FakeRelay {
    fn name(&self) -> &str {
        "fake"
    }

    async fn stream_chat(
        &self,
        _request: ChatRequest<'_>,
        sender: Sender<RelayEvent>,
    ) -> Result<(), RelayError> {
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            assert!(!replies.is_empty(), "unexpected relay invocation");
            replies.remove(0)
        };
        for event in reply.events {
            sender
                .send(event)
                .await
                .map_err(|_| RelayError::ChannelClosed)?;
        }
        match reply.failure {
            Some(error) => Err(error),
            None => sender
                .send(RelayEvent::Finished)
                .await
                .map_err(|_| RelayError::ChannelClosed),
        }
    }

    async fn suggest(&self, _request: SuggestionRequest<'_>) -> Result<Vec<String>, RelayError> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn app_with(replies: Vec<Reply>) -> App {
    App::new(FakeRelay::new(replies), "test-model".to_string())
}

fn submit(app: &mut App, text: &str, attachments: Vec<Attachment>) -> Effect {
    update(
        app,
        Action::Submit {
            text: text.to_string(),
            attachments,
        },
    )
}

/// Performs the effect's background job and feeds every resulting action back
/// through the reducer, recording the status after each one.
async fn drive(app: &mut App, effect: Effect) -> Vec<SessionStatus> {
    let mut statuses = vec![app.status];
    let mut effect = effect;
    loop {
        let (tx, rx) = mpsc::channel();
        match effect {
            Effect::SendMessage | Effect::SpawnRequest => run_relay_job(app.relay_job(), tx).await,
            Effect::EncodeAttachments { text, attachments } => {
                run_encode_job(text, attachments, Limits::default(), tx).await
            }
            _ => return statuses,
        }

        effect = Effect::None;
        for action in rx.try_iter() {
            let next = update(app, action);
            statuses.push(app.status);
            if next != Effect::None {
                effect = next;
            }
        }
    }
}

fn text_of(part: &Part) -> Option<&str> {
    match part {
        Part::Text { text } => Some(text),
        _ => None,
    }
}

// ============================================================================
// Session flows
// ============================================================================

#[tokio::test]
async fn test_empty_submit_is_noop() {
    let mut app = app_with(Vec::new());
    let effect = submit(&mut app, "", Vec::new());

    assert_eq!(effect, Effect::None);
    assert!(app.log.is_empty());
    assert_eq!(app.status, SessionStatus::Idle);
}

#[tokio::test]
async fn test_submit_streams_reply_through_lifecycle() {
    let mut app = app_with(vec![Reply::text(&["Hi", " there"])]);

    let effect = submit(&mut app, "Hello", Vec::new());
    assert_eq!(effect, Effect::SendMessage);
    assert_eq!(app.log.len(), 1);
    assert_eq!(app.log.messages[0].role, Role::User);
    assert_eq!(app.log.messages[0].parts, vec![Part::text("Hello")]);

    let statuses = drive(&mut app, effect).await;
    assert_eq!(
        statuses,
        vec![
            SessionStatus::Submitted,
            SessionStatus::Streaming,
            SessionStatus::Streaming,
            SessionStatus::Idle,
        ]
    );

    assert_eq!(app.log.len(), 2);
    let reply = &app.log.messages[1];
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.plain_text(), "Hi there");
}

#[tokio::test]
async fn test_six_files_rejected_as_a_batch() {
    let mut input = InputController::new(Limits::default());
    let batch: Vec<Attachment> = ["a", "b", "c", "d", "e", "f"]
        .iter()
        .map(|name| {
            Attachment::from_bytes(format!("{name}.png"), "image/png", vec![0; 3 * 1024 * 1024])
        })
        .collect();

    let err = input.add_files(batch).unwrap_err();
    assert_eq!(
        err,
        ValidationError::Attachment(AttachmentError::TooManyFiles { max: 5 })
    );
    assert_eq!(err.to_string(), "You can select a maximum of 5 files.");
    assert!(input.pending().is_empty());
}

#[tokio::test]
async fn test_rate_limit_mid_stream_keeps_partial_reply() {
    let mut app = app_with(vec![Reply::failing(
        &["Partial"],
        RelayError::RateLimited("quota".to_string()),
    )]);

    let effect = submit(&mut app, "Hello", Vec::new());
    let statuses = drive(&mut app, effect).await;

    assert_eq!(statuses.last(), Some(&SessionStatus::Error));
    assert_eq!(app.error.as_deref(), Some(RATE_LIMIT_MESSAGE));
    assert_eq!(app.log.len(), 2);
    assert_eq!(app.log.messages[1].plain_text(), "Partial");

    update(&mut app, Action::DismissError);
    assert_eq!(app.status, SessionStatus::Idle);
    assert!(app.error.is_none());
}

#[tokio::test]
async fn test_regenerate_replaces_last_reply() {
    let mut app = app_with(vec![Reply::text(&["hello"]), Reply::text(&["hey, again"])]);
    let effect = submit(&mut app, "hi", Vec::new());
    drive(&mut app, effect).await;
    assert_eq!(app.log.len(), 2);
    let first_reply_id = app.log.messages[1].id.clone();

    let effect = update(&mut app, Action::Regenerate);
    assert_eq!(effect, Effect::SpawnRequest);
    assert_eq!(app.log.len(), 1);

    drive(&mut app, effect).await;
    assert_eq!(app.status, SessionStatus::Idle);
    assert_eq!(app.log.len(), 2);
    assert_ne!(app.log.messages[1].id, first_reply_id);
    assert_eq!(app.log.messages[1].plain_text(), "hey, again");
}

#[tokio::test]
async fn test_attachments_are_encoded_before_sending() {
    let mut app = app_with(vec![Reply::text(&["A cat."])]);
    let image = Attachment::from_bytes("cat.png", "image/png", vec![0x89, b'P', b'N', b'G']);

    let effect = submit(&mut app, "What is this?", vec![image]);
    assert!(matches!(effect, Effect::EncodeAttachments { .. }));
    assert!(app.is_busy());
    assert!(app.log.is_empty());

    drive(&mut app, effect).await;

    let user = &app.log.messages[0];
    assert_eq!(text_of(&user.parts[0]), Some("What is this?"));
    match &user.parts[1] {
        Part::File {
            media_type,
            filename,
            url,
        } => {
            assert_eq!(media_type, "image/png");
            assert_eq!(filename, "cat.png");
            assert!(url.starts_with("data:image/png;base64,"));
        }
        other => panic!("expected file part, got {other:?}"),
    }
    assert_eq!(app.log.messages[1].plain_text(), "A cat.");
    assert!(!app.is_busy());
}

#[tokio::test]
async fn test_events_after_stop_are_dropped() {
    let mut app = app_with(vec![Reply::text(&["too", " late"])]);
    let effect = submit(&mut app, "Hello", Vec::new());
    assert_eq!(effect, Effect::SendMessage);

    let (tx, rx) = mpsc::channel();
    let job = app.relay_job();
    assert_eq!(update(&mut app, Action::Stop), Effect::AbortRequest);
    run_relay_job(job, tx).await;
    for action in rx.try_iter() {
        update(&mut app, action);
    }

    assert_eq!(app.status, SessionStatus::Idle);
    assert_eq!(app.log.len(), 1);
}

#[tokio::test]
async fn test_second_submit_while_streaming_is_ignored() {
    let mut app = app_with(vec![Reply::text(&["one"])]);
    let effect = submit(&mut app, "first", Vec::new());

    assert_eq!(submit(&mut app, "second", Vec::new()), Effect::None);
    assert_eq!(app.log.len(), 1);

    drive(&mut app, effect).await;
    assert_eq!(app.log.len(), 2);
}
