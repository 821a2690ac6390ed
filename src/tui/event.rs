use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};

/// TUI-specific input events
#[derive(Debug, Clone, PartialEq)]
pub enum TuiEvent {
    // Session
    ForceQuit, // Ctrl+C
    Submit,    // Enter: send, or stop while a response is in flight
    Escape,
    Retry, // Ctrl+R
    Copy,  // Ctrl+Y

    // Editing
    InputChar(char),
    Paste(String), // Bracketed paste - preserves newlines
    Backspace,
    Delete,
    DeleteWordBack, // Ctrl+W
    CursorLeft,
    CursorRight,
    CursorUp,
    CursorDown,
    CursorHome,
    CursorEnd,

    // Attachments
    OpenAttachPrompt,        // Ctrl+O
    PasteImage,              // Ctrl+V reads an image from the system clipboard
    RemoveAttachment(usize), // Alt+1..9, zero-based
    NextSuggestion,          // Tab

    // Scrolling
    ScrollUp,
    ScrollDown,
    ScrollPageUp,
    ScrollPageDown,
    ScrollToBottom, // Ctrl+End - also re-enables stick-to-bottom

    MouseMove(u16, u16),
    MouseClick(u16, u16),
    Resize,
}

/// Wait up to `timeout` for one event.
pub fn poll_event_timeout(timeout: Duration) -> Option<TuiEvent> {
    match event::poll(timeout) {
        Ok(true) => {}
        Ok(false) => return None,
        Err(e) => {
            log::warn!("Event poll failed: {}", e);
            return None;
        }
    }
    match event::read() {
        Ok(event) => translate(event),
        Err(e) => {
            log::warn!("Event read failed: {}", e);
            None
        }
    }
}

/// Poll for an event without blocking (returns immediately)
pub fn poll_event_immediate() -> Option<TuiEvent> {
    poll_event_timeout(Duration::ZERO)
}

fn translate(event: Event) -> Option<TuiEvent> {
    match event {
        Event::Key(key) => translate_key(key),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved => Some(TuiEvent::MouseMove(mouse.column, mouse.row)),
            MouseEventKind::Down(_) => Some(TuiEvent::MouseClick(mouse.column, mouse.row)),
            MouseEventKind::ScrollUp => Some(TuiEvent::ScrollUp),
            MouseEventKind::ScrollDown => Some(TuiEvent::ScrollDown),
            _ => None,
        },
        Event::Paste(data) => Some(TuiEvent::Paste(data)),
        Event::Resize(_, _) => Some(TuiEvent::Resize),
        _ => None,
    }
}

fn translate_key(key: KeyEvent) -> Option<TuiEvent> {
    // The keyboard enhancement protocol also reports releases.
    if key.kind == KeyEventKind::Release {
        return None;
    }
    log::debug!("Key event: {:?} with modifiers {:?}", key.code, key.modifiers);

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    match key.code {
        KeyCode::Char('c') if ctrl => Some(TuiEvent::ForceQuit),
        KeyCode::Char('r') if ctrl => Some(TuiEvent::Retry),
        KeyCode::Char('y') if ctrl => Some(TuiEvent::Copy),
        KeyCode::Char('o') if ctrl => Some(TuiEvent::OpenAttachPrompt),
        KeyCode::Char('v') if ctrl => Some(TuiEvent::PasteImage),
        KeyCode::Char('w') if ctrl => Some(TuiEvent::DeleteWordBack),
        // Ctrl+J inserts newline (ASCII LF; Ctrl+Enter sends this in most terminals)
        KeyCode::Char('j') if ctrl => Some(TuiEvent::InputChar('\n')),
        KeyCode::Char(c @ '1'..='9') if alt => {
            Some(TuiEvent::RemoveAttachment(c as usize - '1' as usize))
        }
        KeyCode::Char(_) if ctrl || alt => None,
        KeyCode::Char(c) => Some(TuiEvent::InputChar(c)),
        KeyCode::Enter if shift || alt => Some(TuiEvent::InputChar('\n')),
        KeyCode::Enter => Some(TuiEvent::Submit),
        KeyCode::Esc => Some(TuiEvent::Escape),
        KeyCode::Tab => Some(TuiEvent::NextSuggestion),
        KeyCode::Backspace => Some(TuiEvent::Backspace),
        KeyCode::Delete => Some(TuiEvent::Delete),
        KeyCode::Left => Some(TuiEvent::CursorLeft),
        KeyCode::Right => Some(TuiEvent::CursorRight),
        KeyCode::Up => Some(TuiEvent::CursorUp),
        KeyCode::Down => Some(TuiEvent::CursorDown),
        KeyCode::Home => Some(TuiEvent::CursorHome),
        KeyCode::End if ctrl => Some(TuiEvent::ScrollToBottom),
        KeyCode::End => Some(TuiEvent::CursorEnd),
        KeyCode::PageUp => Some(TuiEvent::ScrollPageUp),
        KeyCode::PageDown => Some(TuiEvent::ScrollPageDown),
        _ => None,
    }
}
