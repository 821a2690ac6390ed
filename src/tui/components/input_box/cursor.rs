//! Cursor position tracking for the InputBox.
//!
//! `CursorState` owns the byte offset into the draft, the internal scroll
//! offset and the width seen at the last render. The draft itself lives in
//! the `InputController`, so every method takes it as `buffer: &str`.

use super::text_wrap::{
    BORDER_OFFSET, MAX_VISIBLE_LINES, inner_width, wrap_line_count, wrap_options,
};
use ratatui::layout::Rect;

pub(super) struct CursorState {
    /// Byte offset in the draft (0..=buffer.len())
    pub pos: usize,
    /// First visible wrapped line when the draft overflows
    pub scroll_offset: u16,
    /// Width from the last render, used for vertical movement
    pub last_content_width: u16,
}

impl CursorState {
    const DEFAULT_WIDTH: u16 = 80;

    pub fn new() -> Self {
        Self {
            pos: 0,
            scroll_offset: 0,
            last_content_width: Self::DEFAULT_WIDTH,
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.scroll_offset = 0;
    }

    /// Places the cursor after the last character.
    pub fn move_to_end(&mut self, buffer: &str) {
        self.pos = buffer.len();
    }

    /// `(start, len)` in bytes of each wrapped line of `buffer`.
    fn line_starts(buffer: &str, width: u16) -> Vec<(usize, usize)> {
        let lines = textwrap::wrap(buffer, wrap_options(width));
        let mut spans = Vec::with_capacity(lines.len());
        let mut offset = 0;
        for line in &lines {
            // Skip the separators textwrap dropped between lines
            let start = if line.is_empty() {
                offset
            } else {
                offset + buffer[offset..].find(&**line).unwrap_or(0)
            };
            spans.push((start, line.len()));
            offset = start + line.len();
            if buffer[offset..].starts_with('\n') {
                offset += 1;
            }
        }
        spans
    }

    /// Moves one wrapped line up (`-1`) or down (`1`), keeping the column where possible.
    ///
    /// Returns `false` at the first or last line.
    pub fn move_vertically(&mut self, buffer: &str, direction: i16, content_width: u16) -> bool {
        let width = inner_width(content_width);
        if width == 0 || buffer.is_empty() {
            return false;
        }
        let spans = Self::line_starts(buffer, width);
        if spans.is_empty() {
            return false;
        }

        let current = spans
            .iter()
            .position(|&(start, len)| self.pos <= start + len)
            .unwrap_or(spans.len() - 1);
        let column = self.pos.saturating_sub(spans[current].0);

        let target = match direction {
            d if d < 0 && current > 0 => current - 1,
            d if d > 0 && current + 1 < spans.len() => current + 1,
            _ => return false,
        };

        let (start, len) = spans[target];
        let mut pos = start + column.min(len);
        while !buffer.is_char_boundary(pos) {
            pos -= 1;
        }
        self.pos = pos;
        true
    }

    /// Which wrapped line (0-based) the cursor is on.
    pub fn calculate_line(&self, buffer: &str, content_width: u16) -> u16 {
        let width = inner_width(content_width);
        if width == 0 {
            return 0;
        }

        let before = &buffer[..self.pos];
        let lines = textwrap::wrap(before, wrap_options(width));
        let mut line = u16::try_from(lines.len().saturating_sub(1)).unwrap_or(u16::MAX);

        // A newline right before the cursor opens a line textwrap doesn't emit
        if before.ends_with('\n') && !lines.last().is_some_and(|l| l.is_empty()) {
            line = line.saturating_add(1);
        }
        line
    }

    /// Keeps the cursor inside the visible window.
    pub fn update_scroll_offset(&mut self, buffer: &str, content_width: u16) {
        let width = inner_width(content_width);
        if wrap_line_count(buffer, width) <= MAX_VISIBLE_LINES {
            self.scroll_offset = 0;
            return;
        }

        let cursor_line = self.calculate_line(buffer, content_width);
        if cursor_line < self.scroll_offset {
            self.scroll_offset = cursor_line;
        } else if cursor_line >= self.scroll_offset + MAX_VISIBLE_LINES {
            self.scroll_offset = cursor_line.saturating_sub(MAX_VISIBLE_LINES - 1);
        }
    }

    /// Screen position (column, row) of the cursor within `area`.
    pub fn screen_pos(&self, buffer: &str, area: Rect) -> (u16, u16) {
        let width = inner_width(area.width);
        if width == 0 {
            return (area.x + BORDER_OFFSET, area.y + BORDER_OFFSET);
        }

        let before = &buffer[..self.pos];
        let cursor_line = self.calculate_line(buffer, area.width);

        // Column from the last logical line; textwrap trims trailing spaces,
        // so count characters rather than use the wrapped segment length.
        let logical = &before[before.rfind('\n').map_or(0, |i| i + 1)..];
        let segments = textwrap::wrap(logical, wrap_options(width));
        let consumed: usize = segments
            .iter()
            .take(segments.len().saturating_sub(1))
            .map(|seg| seg.chars().count())
            .sum();
        let column = logical.chars().count().saturating_sub(consumed);
        let column = u16::try_from(column).unwrap_or(width).min(width);

        let row = cursor_line.saturating_sub(self.scroll_offset);
        (area.x + BORDER_OFFSET + column, area.y + BORDER_OFFSET + row)
    }
}
