//! # TitleBar Component
//!
//! Single-line status bar: model, session status, and a "↓ New" marker
//! when streamed content has landed below the scroll position.
//!
//! Stateless. All three props come from different owners: `model_name`
//! and `status_message` from the core `App`, `has_unseen_content` from the
//! message list's scroll state.

use crate::tui::component::Component;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

pub struct TitleBar {
    pub model_name: String,
    pub status_message: String,
    pub has_unseen_content: bool,
}

impl TitleBar {
    pub fn new(model_name: String, status_message: String, has_unseen_content: bool) -> Self {
        Self {
            model_name,
            status_message,
            has_unseen_content,
        }
    }

    fn line(&self) -> Line<'static> {
        let dim = Style::default().fg(Color::DarkGray);
        let mut spans = vec![
            Span::styled(
                "Lumen",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" (model: {})", self.model_name), dim),
        ];
        if !self.status_message.is_empty() {
            spans.push(Span::styled(" | ", dim));
            spans.push(Span::raw(self.status_message.clone()));
        }
        if self.has_unseen_content {
            spans.push(Span::styled(" | ", dim));
            spans.push(Span::styled("↓ New", Style::default().fg(Color::Cyan)));
        }
        Line::from(spans)
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(self.line(), area);
    }
}
