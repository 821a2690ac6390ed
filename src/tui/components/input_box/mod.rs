//! # InputBox Component
//!
//! The draft editor and attachment tray.
//!
//! ## Responsibilities
//!
//! - Capture and edit text (cursor movement, paste, word delete)
//! - Show pending attachments with their size and removal key
//! - Emit `Submit` on Enter (the parent decides whether that means send or stop)
//!
//! ## State Management
//!
//! Draft and attachments live in the core `InputController`, which enforces
//! the character cap and attachment limits. This component only owns the
//! cursor. Every edit is applied by handing the controller the new draft;
//! a rejected edit leaves the buffer and cursor where they were.

mod cursor;
mod text_wrap;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph};

use crate::core::attachment::{Attachment, FileKind};
use crate::core::input::InputController;
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

use cursor::CursorState;
use text_wrap::{
    BORDER_OFFSET, MAX_VISIBLE_LINES, VERTICAL_OVERHEAD, inner_width, next_char_boundary,
    prev_char_boundary, prev_word_boundary, wrap_line_count, wrap_options,
};

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Enter pressed
    Submit,
    ContentChanged,
    /// The edit would exceed the draft cap; a warning was recorded
    Rejected,
}

pub struct InputBox {
    pub controller: InputController,
    /// A response is in flight, Enter stops it (Prop)
    pub busy: bool,
    /// Keyboard focus is on the message list (Prop)
    pub dimmed: bool,
    cursor: CursorState,
}

fn kind_icon(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Image => "▣",
        FileKind::Pdf => "▤",
        FileKind::Text | FileKind::Unknown => "□",
    }
}

fn tray_line(index: usize, attachment: &Attachment) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("Alt+{} ✕ ", index + 1),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{} ", kind_icon(attachment.kind())),
            Style::default().fg(Color::Magenta),
        ),
        Span::raw(attachment.name.clone()),
        Span::styled(
            format!(" · {}", attachment.size_label()),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

impl InputBox {
    pub fn new(controller: InputController) -> Self {
        Self {
            controller,
            busy: false,
            dimmed: false,
            cursor: CursorState::new(),
        }
    }

    pub fn draft(&self) -> &str {
        self.controller.draft()
    }

    /// Replaces the draft and moves the cursor to its end.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        if self.controller.set_draft_text(text).is_err() {
            return false;
        }
        self.cursor.move_to_end(self.controller.draft());
        true
    }

    /// Clears draft and attachments after the session accepted a submission.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.cursor.reset();
    }

    fn tray_rows(&self) -> u16 {
        u16::try_from(self.controller.pending().len()).unwrap_or(u16::MAX)
    }

    /// Calculate required height for tray plus draft, clamped to the visible line limit.
    pub fn calculate_height(&self, content_width: u16) -> u16 {
        let width = inner_width(content_width);
        let draft_lines = wrap_line_count(self.draft(), width).min(MAX_VISIBLE_LINES);
        self.tray_rows() + draft_lines + VERTICAL_OVERHEAD
    }

    /// Replace `start..end` of the draft with `insert`, leaving the cursor after it.
    fn splice(&mut self, start: usize, end: usize, insert: &str) -> InputEvent {
        let draft = self.draft();
        let mut next = String::with_capacity(draft.len() + insert.len());
        next.push_str(&draft[..start]);
        next.push_str(insert);
        next.push_str(&draft[end..]);
        match self.controller.set_draft_text(next) {
            Ok(()) => {
                self.cursor.pos = start + insert.len();
                InputEvent::ContentChanged
            }
            Err(_) => InputEvent::Rejected,
        }
    }

    fn visible_text(&self, content_width: u16) -> String {
        if self.cursor.scroll_offset == 0 {
            return self.draft().to_string();
        }
        let width = inner_width(content_width);
        if width == 0 {
            return String::new();
        }
        let lines = textwrap::wrap(self.draft(), wrap_options(width));
        let start = usize::from(self.cursor.scroll_offset).min(lines.len());
        let end = (start + usize::from(MAX_VISIBLE_LINES)).min(lines.len());
        lines[start..end].join("\n")
    }

    fn render_scrollbar(&self, frame: &mut Frame, text_area: Rect) {
        use ratatui::widgets::{Scrollbar, ScrollbarOrientation, ScrollbarState};

        let total_lines = wrap_line_count(self.draft(), inner_width(text_area.width));
        if total_lines <= MAX_VISIBLE_LINES {
            return;
        }
        // ScrollbarState content_length is max scrollable position, not total items
        let max_scroll = total_lines.saturating_sub(MAX_VISIBLE_LINES);
        let mut scrollbar_state = ScrollbarState::default()
            .content_length(usize::from(max_scroll))
            .position(usize::from(self.cursor.scroll_offset));
        let scrollbar_area = Rect {
            x: text_area.x + text_area.width.saturating_sub(1),
            y: text_area.y + BORDER_OFFSET,
            width: 1,
            height: text_area.height.saturating_sub(2),
        };
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        self.cursor.last_content_width = area.width;
        let draft = self.controller.draft().to_string();
        self.cursor.update_scroll_offset(&draft, area.width);

        let limits = self.controller.limits();
        let count = draft.chars().count();
        let title = if self.busy {
            " Message · Enter to stop ".to_string()
        } else {
            " Message ".to_string()
        };
        let counter_style = if count * 10 >= limits.max_draft_chars * 9 {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let pending = self.controller.pending();
        let files_hint = format!(" {}/{} files ", pending.len(), limits.max_files);

        let border_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green)
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(title)
            .title_bottom(Line::from(files_hint).right_aligned())
            .title_bottom(
                Line::from(Span::styled(
                    format!(" {count}/{} ", limits.max_draft_chars),
                    counter_style,
                ))
                .left_aligned(),
            )
            .padding(Padding::horizontal(1));

        let mut lines: Vec<Line<'static>> = pending
            .iter()
            .enumerate()
            .map(|(i, a)| tray_line(i, a))
            .collect();
        let draft_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        if draft.is_empty() && pending.is_empty() {
            lines.push(Line::from(Span::styled(
                "Ask anything… (Ctrl+O attach, Ctrl+J newline)",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        } else {
            for line in self.visible_text(area.width).split('\n') {
                lines.push(Line::from(Span::styled(line.to_string(), draft_style)));
            }
        }

        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);

        let tray = self.tray_rows().min(area.height.saturating_sub(VERTICAL_OVERHEAD));
        let text_area = Rect {
            y: area.y + tray,
            height: area.height.saturating_sub(tray),
            ..area
        };
        self.render_scrollbar(frame, text_area);

        if !self.dimmed {
            let (x, y) = self.cursor.screen_pos(&draft, text_area);
            frame.set_cursor_position((x + 1, y));
        }
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        let pos = self.cursor.pos;
        let len = self.draft().len();
        match event {
            TuiEvent::InputChar(c) => {
                let mut buf = [0u8; 4];
                Some(self.splice(pos, pos, c.encode_utf8(&mut buf)))
            }
            TuiEvent::Paste(text) => {
                // Terminals send CR for newlines in some paste modes
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                Some(self.splice(pos, pos, &text))
            }
            TuiEvent::Backspace if pos > 0 => {
                let prev = prev_char_boundary(self.draft(), pos);
                Some(self.splice(prev, pos, ""))
            }
            TuiEvent::Delete if pos < len => {
                let next = next_char_boundary(self.draft(), pos);
                let event = self.splice(pos, next, "");
                self.cursor.pos = pos;
                Some(event)
            }
            TuiEvent::DeleteWordBack if pos > 0 => {
                let start = prev_word_boundary(self.draft(), pos);
                Some(self.splice(start, pos, ""))
            }
            TuiEvent::CursorLeft if pos > 0 => {
                self.cursor.pos = prev_char_boundary(self.draft(), pos);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorRight if pos < len => {
                self.cursor.pos = next_char_boundary(self.draft(), pos);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorHome => {
                let line_start = self.draft()[..pos].rfind('\n').map_or(0, |i| i + 1);
                (pos != line_start).then(|| {
                    self.cursor.pos = line_start;
                    InputEvent::ContentChanged
                })
            }
            TuiEvent::CursorEnd => {
                let line_end = self.draft()[pos..].find('\n').map_or(len, |i| pos + i);
                (pos != line_end).then(|| {
                    self.cursor.pos = line_end;
                    InputEvent::ContentChanged
                })
            }
            TuiEvent::CursorUp => {
                let width = self.cursor.last_content_width;
                let draft = self.controller.draft();
                self.cursor
                    .move_vertically(draft, -1, width)
                    .then_some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorDown => {
                let width = self.cursor.last_content_width;
                let draft = self.controller.draft();
                self.cursor
                    .move_vertically(draft, 1, width)
                    .then_some(InputEvent::ContentChanged)
            }
            TuiEvent::Submit => Some(InputEvent::Submit),
            _ => None,
        }
    }
}
