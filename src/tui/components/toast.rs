//! # Toast Component
//!
//! Transient notice in the top-right corner: validation warnings,
//! clipboard results, saved files. Expires on its own.

use std::time::{Duration, Instant};

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Clear, Padding, Paragraph, Wrap};

use crate::tui::component::Component;

const TOAST_TTL: Duration = Duration::from_secs(3);
const MAX_WIDTH: u16 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    shown_at: Instant,
}

impl Toast {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, ToastLevel::Info)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, ToastLevel::Warning)
    }

    fn new(message: impl Into<String>, level: ToastLevel) -> Self {
        Self {
            message: message.into(),
            level,
            shown_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= TOAST_TTL
    }

    /// Box in the top-right corner of `area`, sized to the wrapped message.
    fn placement(&self, area: Rect) -> Rect {
        let width = MAX_WIDTH.min(area.width);
        let inner = usize::from(width.saturating_sub(4)).max(1);
        let lines = textwrap::wrap(&self.message, inner).len().max(1);
        let height = u16::try_from(lines)
            .unwrap_or(u16::MAX)
            .saturating_add(2)
            .min(area.height);
        Rect {
            x: area.x + area.width - width,
            y: area.y,
            width,
            height,
        }
    }
}

impl Component for Toast {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        if area.width < 8 || area.height < 3 {
            return;
        }
        let rect = self.placement(area);
        let (title, color) = match self.level {
            ToastLevel::Info => (" Info ", Color::Cyan),
            ToastLevel::Warning => (" Warning ", Color::Yellow),
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(color))
            .title(Line::from(title).style(Style::default().fg(color)))
            .padding(Padding::horizontal(1));

        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(self.message.as_str())
                .wrap(Wrap { trim: true })
                .block(block),
            rect,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_expires_after_ttl() {
        let toast = Toast::warning("You can select a maximum of 5 files.");
        assert!(!toast.is_expired(Instant::now()));
        assert!(toast.is_expired(Instant::now() + TOAST_TTL));
    }

    #[test]
    fn test_renders_in_top_right() {
        let backend = TestBackend::new(80, 10);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut toast = Toast::warning("Too many files");
        terminal.draw(|f| toast.render(f, f.area())).unwrap();

        let buffer = terminal.backend().buffer();
        let first_row: String = (0..80).map(|x| buffer[(x, 0)].symbol()).collect();
        assert!(first_row.trim_start().starts_with("╭ Warning"));
        let second_row: String = (0..80).map(|x| buffer[(x, 1)].symbol()).collect();
        assert!(second_row.contains("Too many files"));
        assert_eq!(buffer[(0, 1)].symbol(), " ");
    }

    #[test]
    fn test_long_message_wraps() {
        let toast = Toast::info("word ".repeat(30));
        let rect = toast.placement(Rect::new(0, 0, 80, 24));
        assert_eq!(rect.width, MAX_WIDTH);
        assert!(rect.height > 3);
    }
}
