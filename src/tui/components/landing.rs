//! # Landing Page Component
//!
//! Shown while the conversation is empty: a greeting and the starter prompts.
//!

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::component::Component;

pub struct LandingPage<'a> {
    suggestions: &'a [&'a str],
    /// Suggestion last copied into the draft with Tab
    selected: Option<usize>,
}

impl<'a> LandingPage<'a> {
    pub fn new(suggestions: &'a [&'a str], selected: Option<usize>) -> Self {
        Self {
            suggestions,
            selected,
        }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(Span::styled(
                "Hello User!",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "How can I help you today?",
                Style::default().fg(Color::Gray),
            )),
            Line::default(),
        ];

        for (i, suggestion) in self.suggestions.iter().enumerate() {
            let style = if self.selected == Some(i) {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            lines.push(Line::from(Span::styled(
                format!("{}. {}", i + 1, suggestion),
                style,
            )));
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Tab to use a suggestion · v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        )));
        lines
    }
}

impl Component for LandingPage<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines = self.lines();
        let height = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        let [text_area] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);

        frame.render_widget(
            Paragraph::new(lines).alignment(Alignment::Center),
            text_area,
        );
    }
}
