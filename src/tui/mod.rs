//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! and translates keyboard events into core::Action values.
//!
//! This is the only module that knows about ratatui, crossterm and the
//! system clipboard.
//!
//! ## Redraw Strategy
//!
//! The event loop uses conditional redraw to avoid unnecessary work:
//!
//! - **Animating** (landing page, loading, toast or "copied" showing): draws
//!   every ~80ms so spinners move and timed indicators reset on time.
//! - **Idle** (conversation, no input): sleeps up to 500ms, only redraws on events
//!   or terminal resize. Animation math is also skipped.
//!
//! A `SteadyBlock` cursor style is used instead of a blinking cursor because
//! ratatui's `set_cursor_position` resets the terminal's blink timer on every
//! `draw()` call, making blinking cursors appear erratic during continuous redraws.

mod clipboard;
mod component;
mod components;
mod event;
pub mod markdown;
mod thumbnail;
mod ui;

use log::{debug, info, warn};
use std::io::stdout;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use ratatui::layout::Rect;
use tokio::task::AbortHandle;

use crate::core::action::{Action, Effect, update};
use crate::core::attachment::Attachment;
use crate::core::config::{Limits, ResolvedConfig};
use crate::core::input::{ClipboardItem, InputController, PasteOutcome};
use crate::core::relay_task::{run_encode_job, run_relay_job, run_suggestion_job};
use crate::core::state::App;
use crate::core::view::build_view;
use crate::inference::suggestions::STARTER_SUGGESTIONS;
use crate::inference::{ChatRelay, GeminiProvider, OpenRouterProvider, RelayError};
use crate::tui::component::EventHandler;
use crate::tui::components::toast::Toast;
use crate::tui::components::{
    FilePreviewState, InputBox, InputEvent, MessageListState, PreviewEvent,
};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// How long the "Copied" indicator stays up.
const COPIED_RESET: Duration = Duration::from_secs(1);

/// Modal input mode: determines how keyboard events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Navigate messages with arrow keys. Typing auto-switches to Input.
    Cursor,
    /// Text editing in the input box. Esc switches to Cursor.
    Input,
}

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    // Persistent component states
    pub message_list: MessageListState,
    pub input_box: InputBox,
    // Modal input mode
    pub input_mode: InputMode,
    // Animation state
    pub pulse_value: f32,
    // Overlays (None = hidden)
    pub preview: Option<FilePreviewState>,
    pub toast: Option<Toast>,
    /// Path being typed after Ctrl+O
    pub attach_prompt: Option<String>,
    /// Suggestion last copied into the draft with Tab
    pub suggestion_cursor: Option<usize>,
    copied_at: Option<Instant>,
}

impl TuiState {
    pub fn new(limits: Limits) -> Self {
        Self {
            message_list: MessageListState::new(),
            input_box: InputBox::new(InputController::new(limits)),
            input_mode: InputMode::Input, // User expects to type immediately
            pulse_value: 0.0,
            preview: None,
            toast: None,
            attach_prompt: None,
            suggestion_cursor: None,
            copied_at: None,
        }
    }

    /// The copy action fired within the last second.
    pub fn is_copied(&self) -> bool {
        self.copied_at.is_some_and(|t| t.elapsed() < COPIED_RESET)
    }

    /// Something on screen changes with time alone.
    fn has_timed_overlay(&self) -> bool {
        self.toast.is_some() || self.copied_at.is_some()
    }

    /// Drops timed indicators that ran out. Returns true if anything changed.
    fn expire(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if self.toast.as_ref().is_some_and(|t| t.is_expired(now)) {
            self.toast = None;
            changed = true;
        }
        if self.copied_at.is_some() && !self.is_copied() {
            self.copied_at = None;
            changed = true;
        }
        changed
    }

    /// Moves the newest validation warning into the toast slot.
    fn surface_warnings(&mut self) {
        if let Some(warning) = self.input_box.controller.drain_warnings().pop() {
            self.toast = Some(Toast::warning(warning));
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Enable Kitty keyboard protocol unconditionally (allows Shift+Enter detection)
        // Detection via supports_keyboard_enhancement() fails in WSL, but the protocol
        // is harmlessly ignored by terminals that don't support it
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            // Show cursor for input editing
            Show,
            // Non-blinking, so continuous redraws don't restart the blink timer
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!("Terminal modes enabled (mouse, paste, steady cursor, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide // Hide cursor on exit
        );
    }
}

/// Build a relay from a resolved config's provider name and credentials.
pub fn build_provider(config: &ResolvedConfig) -> Result<Arc<dyn ChatRelay>, RelayError> {
    match config.provider.as_str() {
        "openrouter" => {
            let api_key = config.openrouter_api_key.clone().ok_or_else(|| {
                RelayError::Config(
                    "OpenRouter API key not set (config file or OPENROUTER_API_KEY)".to_string(),
                )
            })?;
            Ok(Arc::new(OpenRouterProvider::new(
                api_key,
                Some(config.openrouter_base_url.clone()),
                config.max_duration,
            )))
        }
        "gemini" => {
            let api_key = config.gemini_api_key.clone().ok_or_else(|| {
                RelayError::Config(
                    concat!(
                        "Gemini API key not set (config file, ",
                        "GEMINI_API_KEY or GOOGLE_GENERATIVE_AI_API_KEY)"
                    )
                    .to_string(),
                )
            })?;
            Ok(Arc::new(GeminiProvider::new(
                api_key,
                Some(config.gemini_base_url.clone()),
                config.max_duration,
            )))
        }
        other => Err(RelayError::Config(format!(
            "unknown provider '{other}' (expected gemini or openrouter)"
        ))),
    }
}

/// Background work the loop can cancel.
#[derive(Default)]
struct Tasks {
    relay: Option<AbortHandle>,
}

/// Everything the event handlers touch, borrowed for one loop iteration.
struct Session<'a> {
    app: &'a mut App,
    tui: &'a mut TuiState,
    tasks: &'a mut Tasks,
    tx: &'a mpsc::Sender<Action>,
}

impl Session<'_> {
    /// Runs `action` through the reducer and performs its effect. Returns true to quit.
    fn dispatch(&mut self, action: Action) -> bool {
        let effect = update(self.app, action);
        self.apply(effect)
    }

    fn apply(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::None => {}
            Effect::EncodeAttachments { text, attachments } => {
                let limits = *self.tui.input_box.controller.limits();
                tokio::spawn(run_encode_job(text, attachments, limits, self.tx.clone()));
            }
            Effect::SendMessage => {
                self.tui.input_box.reset();
                self.tui.message_list.stick_to_bottom = true;
                self.spawn_relay();
            }
            Effect::SpawnRequest => {
                self.tui.message_list.stick_to_bottom = true;
                self.spawn_relay();
            }
            Effect::AbortRequest => {
                if let Some(handle) = self.tasks.relay.take() {
                    handle.abort();
                }
            }
            Effect::FetchSuggestions { prompt } => {
                debug!("Fetching suggestions for generation {}", self.app.generation);
                tokio::spawn(run_suggestion_job(
                    self.app.relay.clone(),
                    prompt,
                    self.app.model_name.clone(),
                    self.app.generation,
                    self.tx.clone(),
                ));
            }
            Effect::Warn(message) => self.tui.toast = Some(Toast::warning(message)),
            Effect::Quit => return true,
        }
        false
    }

    /// Applies an action reported by a background job. Returns true to quit.
    fn receive(&mut self, action: Action) -> bool {
        if let Action::RelayFinished { generation } | Action::RelayFailed { generation, .. } =
            &action
            && *generation == self.app.generation
        {
            self.tasks.relay = None;
        }
        self.dispatch(action)
    }

    fn spawn_relay(&mut self) {
        info!("Spawning relay job {}", self.app.generation);
        self.tui.suggestion_cursor = None;
        if let Some(previous) = self.tasks.relay.take() {
            previous.abort();
        }
        let handle = tokio::spawn(run_relay_job(self.app.relay_job(), self.tx.clone()));
        self.tasks.relay = Some(handle.abort_handle());
    }

    /// Enter in the input box: send the draft, or stop the response in flight.
    fn submit(&mut self) -> bool {
        if self.app.status.is_busy() {
            return self.dispatch(Action::Stop);
        }
        let text = self.tui.input_box.draft().to_string();
        let attachments = self.tui.input_box.controller.pending().to_vec();
        if text.trim().is_empty() && !attachments.is_empty() {
            self.tui.toast = Some(Toast::info("Add a message to send with your attachments."));
            return false;
        }
        self.dispatch(Action::Submit { text, attachments })
    }

    fn escape(&mut self) -> bool {
        if self.app.error.is_some() {
            return self.dispatch(Action::DismissError);
        }
        if self.app.status.is_busy() {
            return self.dispatch(Action::Stop);
        }
        if self.tui.input_mode == InputMode::Input {
            self.tui.input_mode = InputMode::Cursor;
            self.tui.message_list.selected_index = self.app.log.len().checked_sub(1);
        }
        false
    }

    fn retry(&mut self) -> bool {
        if !self.app.can_regenerate() {
            if !self.app.is_busy() {
                self.tui.toast = Some(Toast::info("Nothing to retry."));
            }
            return false;
        }
        self.dispatch(Action::Regenerate)
    }

    fn copy_latest(&mut self) {
        let view = build_view(&self.app.log, self.app.status);
        let Some(actions) = view.messages.iter().rev().find_map(|m| m.actions.as_ref()) else {
            return;
        };
        match clipboard::copy_text(&actions.copy_text) {
            Ok(()) => self.tui.copied_at = Some(Instant::now()),
            Err(e) => {
                warn!("Copy failed: {}", e);
                self.tui.toast = Some(Toast::warning(e.to_string()));
            }
        }
    }

    /// Tab: put the next suggestion into the draft.
    fn next_suggestion(&mut self) {
        let suggestions: Vec<&str> = if self.app.log.is_empty() {
            STARTER_SUGGESTIONS.to_vec()
        } else if !self.app.is_busy() {
            self.app.suggestions.iter().map(String::as_str).collect()
        } else {
            Vec::new()
        };
        if suggestions.is_empty() {
            return;
        }
        let next = self
            .tui
            .suggestion_cursor
            .map_or(0, |i| (i + 1) % suggestions.len());
        if self.tui.input_box.set_text(suggestions[next]) {
            self.tui.suggestion_cursor = Some(next);
            self.tui.input_mode = InputMode::Input;
        }
    }

    /// Bracketed paste: image paths attach, anything else is typed.
    fn paste(&mut self, text: String) {
        let items = clipboard::classify_paste(&text);
        match self.tui.input_box.controller.add_from_clipboard(items) {
            PasteOutcome::Attached(count) => {
                self.tui.toast = Some(Toast::info(format!("Attached {count} image(s)")));
            }
            PasteOutcome::Rejected => {}
            PasteOutcome::FallThrough => {
                self.tui.input_box.handle_event(&TuiEvent::Paste(text));
            }
        }
    }

    /// Ctrl+V: attach the image currently on the system clipboard.
    fn paste_image(&mut self) {
        match clipboard::read_image_png() {
            Ok(Some(png)) => {
                let item = ClipboardItem::File(Attachment::from_clipboard_png(png));
                if let PasteOutcome::Attached(_) =
                    self.tui.input_box.controller.add_from_clipboard(vec![item])
                {
                    self.tui.toast = Some(Toast::info("Attached image from clipboard"));
                }
            }
            Ok(None) => self.tui.toast = Some(Toast::info("No image on the clipboard.")),
            Err(e) => {
                warn!("Clipboard image read failed: {}", e);
                self.tui.toast = Some(Toast::warning(e.to_string()));
            }
        }
    }

    /// Enter in the attach prompt: validate every path, then add them as one batch.
    fn attach_paths(&mut self, input: &str) {
        let paths = clipboard::split_paths(input);
        if paths.is_empty() {
            return;
        }
        let mut batch = Vec::with_capacity(paths.len());
        for path in &paths {
            match Attachment::from_path(path) {
                Ok(attachment) => batch.push(attachment),
                Err(e) => {
                    warn!("Attach failed for {}: {}", path, e);
                    self.tui.toast = Some(Toast::warning(e.to_string()));
                    return;
                }
            }
        }
        if let Ok(count) = self.tui.input_box.controller.add_files(batch) {
            self.tui.toast = Some(Toast::info(format!("Attached {count} file(s)")));
        }
    }

    fn open_preview(&mut self) {
        let Some(message) = self
            .tui
            .message_list
            .selected_index
            .and_then(|i| self.app.log.messages.get(i))
        else {
            return;
        };
        match FilePreviewState::for_message(message) {
            Some(state) => self.tui.preview = Some(state),
            None => self.tui.toast = Some(Toast::info("This message has no attachments.")),
        }
    }

    fn toggle_selected(&mut self) {
        if let Some(message) = self
            .tui
            .message_list
            .selected_index
            .and_then(|i| self.app.log.messages.get(i))
        {
            let id = message.id.clone();
            self.tui.message_list.toggle_expanded(&id);
        }
    }

    fn preview_event(&mut self, event: &TuiEvent) {
        let Some(preview) = self.tui.preview.as_mut() else {
            return;
        };
        match preview.handle_event(event) {
            Some(PreviewEvent::Dismiss) => self.tui.preview = None,
            Some(PreviewEvent::Save) => {
                let dir = dirs::download_dir()
                    .or_else(|| std::env::current_dir().ok())
                    .unwrap_or_else(|| PathBuf::from("."));
                if let Err(e) = preview.save_to(&dir) {
                    self.tui.toast = Some(Toast::warning(format!("Save failed: {e}")));
                }
            }
            None => {}
        }
    }

    fn attach_prompt_event(&mut self, event: &TuiEvent) {
        let Some(prompt) = self.tui.attach_prompt.as_mut() else {
            return;
        };
        match event {
            TuiEvent::Escape => self.tui.attach_prompt = None,
            TuiEvent::Submit => {
                let input = std::mem::take(prompt);
                self.tui.attach_prompt = None;
                self.attach_paths(&input);
            }
            TuiEvent::InputChar(c) => prompt.push(*c),
            TuiEvent::Paste(text) => prompt.push_str(&text.replace(['\r', '\n'], " ")),
            TuiEvent::Backspace => {
                prompt.pop();
            }
            _ => {}
        }
    }

    /// Handles one terminal event. Returns true to quit.
    fn handle_event(&mut self, event: TuiEvent, frame_area: Rect) -> bool {
        // ForceQuit (Ctrl+C) always quits regardless of mode
        if matches!(event, TuiEvent::ForceQuit) {
            return self.dispatch(Action::Quit);
        }

        // Overlays take every other event while open
        if self.tui.preview.is_some() {
            self.preview_event(&event);
            return false;
        }
        if self.tui.attach_prompt.is_some() {
            self.attach_prompt_event(&event);
            return false;
        }

        match event {
            // Resize just needs a redraw
            TuiEvent::Resize => return false,
            // Mouse hover, any mode
            TuiEvent::MouseMove(_col, row) => {
                self.tui.message_list.selected_index = self.hit_test(row, frame_area);
                return false;
            }
            // Mouse click selects and toggles reasoning and citations
            TuiEvent::MouseClick(_col, row) => {
                if let Some(idx) = self.hit_test(row, frame_area) {
                    self.tui.message_list.selected_index = Some(idx);
                    self.toggle_selected();
                }
                return false;
            }
            // Scroll events go to the message list in any mode
            TuiEvent::ScrollUp
            | TuiEvent::ScrollDown
            | TuiEvent::ScrollPageUp
            | TuiEvent::ScrollPageDown
            | TuiEvent::ScrollToBottom => {
                self.tui.message_list.handle_event(&event);
                return false;
            }
            TuiEvent::Retry => return self.retry(),
            TuiEvent::Copy => {
                self.copy_latest();
                return false;
            }
            TuiEvent::NextSuggestion => {
                self.next_suggestion();
                return false;
            }
            TuiEvent::OpenAttachPrompt => {
                self.tui.attach_prompt = Some(String::new());
                return false;
            }
            TuiEvent::PasteImage => {
                self.paste_image();
                return false;
            }
            TuiEvent::RemoveAttachment(index) => {
                if let Some(removed) = self.tui.input_box.controller.remove_file(index) {
                    debug!("Removed attachment {}", removed.name);
                }
                return false;
            }
            TuiEvent::Escape => return self.escape(),
            _ => {}
        }

        // Modal event dispatch
        match self.tui.input_mode {
            InputMode::Input => {
                if let TuiEvent::Paste(text) = event {
                    self.paste(text);
                    return false;
                }
                match self.tui.input_box.handle_event(&event) {
                    Some(InputEvent::Submit) => return self.submit(),
                    Some(InputEvent::ContentChanged | InputEvent::Rejected) | None => {}
                }
            }
            InputMode::Cursor => match event {
                // Space toggles reasoning and citations of the selected message
                TuiEvent::InputChar(' ') => self.toggle_selected(),
                TuiEvent::InputChar('o') => self.open_preview(),
                // Typing auto-switches to Input mode and forwards the event
                TuiEvent::InputChar(_) => {
                    self.tui.input_mode = InputMode::Input;
                    self.tui.message_list.selected_index = None;
                    self.tui.input_box.handle_event(&event);
                }
                TuiEvent::Paste(text) => {
                    self.tui.input_mode = InputMode::Input;
                    self.tui.message_list.selected_index = None;
                    self.paste(text);
                }
                // Enter switches to Input mode
                TuiEvent::Submit => {
                    self.tui.input_mode = InputMode::Input;
                    self.tui.message_list.selected_index = None;
                }
                TuiEvent::CursorUp => self.tui.message_list.select_previous(self.app.log.len()),
                TuiEvent::CursorDown => self.tui.message_list.select_next(self.app.log.len()),
                _ => {}
            },
        }
        false
    }

    fn hit_test(&self, row: u16, frame_area: Rect) -> Option<usize> {
        let main = ui::screen_layout(frame_area, &*self.app, &*self.tui).main;
        ui::hit_test_message(
            row,
            main,
            self.tui.message_list.scroll_state.offset().y,
            &self.tui.message_list.layout.prefix_heights,
        )
    }
}

/// Startup input: a pre-filled draft and files attached as one batch.
#[derive(Debug, Default)]
pub struct Prefill {
    pub prompt: Option<String>,
    pub attach: Vec<PathBuf>,
}

fn apply_prefill(tui: &mut TuiState, prefill: Prefill) {
    if let Some(prompt) = prefill.prompt
        && !tui.input_box.set_text(prompt)
    {
        tui.surface_warnings();
    }
    if prefill.attach.is_empty() {
        return;
    }
    let batch: Result<Vec<Attachment>, _> =
        prefill.attach.iter().map(Attachment::from_path).collect();
    match batch {
        Ok(batch) => {
            if tui.input_box.controller.add_files(batch).is_err() {
                tui.surface_warnings();
            }
        }
        Err(e) => {
            warn!("Startup attachment failed: {}", e);
            tui.toast = Some(Toast::warning(e.to_string()));
        }
    }
}

pub fn run(
    config: ResolvedConfig,
    relay: Arc<dyn ChatRelay>,
    prefill: Prefill,
) -> std::io::Result<()> {
    let mut app = App::from_config(relay, &config);
    let mut tui = TuiState::new(config.limits);
    apply_prefill(&mut tui, prefill);

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();
    let mut tasks = Tasks::default();

    // Animation timer
    let start_time = Instant::now();
    let mut needs_redraw = true; // Force first frame

    loop {
        // Determine if animations are running (landing page, loading spinner, timed overlays)
        let animating = app.is_busy() || app.log.is_empty() || tui.has_timed_overlay();

        if tui.expire(Instant::now()) || animating {
            needs_redraw = true;
        }

        // Only draw when something changed
        if needs_redraw {
            let elapsed = start_time.elapsed().as_secs_f32();
            tui.pulse_value = (elapsed * 5.0).sin() * 0.5 + 0.5;
            let spinner_frame = (elapsed * 12.0) as usize;
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui, spinner_frame))?;
            needs_redraw = false;
        }

        // Dynamic poll timeout: short when animating (~12fps), long when idle
        let timeout = if animating {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(500)
        };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        let frame_area = terminal.get_frame().area();
        let mut session = Session {
            app: &mut app,
            tui: &mut tui,
            tasks: &mut tasks,
            tx: &tx,
        };

        // Process first event + drain ALL pending events before next draw
        let mut should_quit = false;
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if session.handle_event(event, frame_area) {
                should_quit = true;
                break;
            }
            session.tui.surface_warnings();
        }

        if should_quit {
            break;
        }

        // Handle background task actions (streaming responses, encodes, suggestions)
        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            if session.receive(action) {
                should_quit = true;
                break;
            }
        }

        if should_quit {
            break;
        }
    }

    if let Some(handle) = tasks.relay.take() {
        handle.abort();
    }
    ratatui::restore();
    info!("Lumen shut down");
    Ok(())
}
