//! Wrapping math and dimensional constants for the InputBox.
//!
//! Stateless helpers with no dependency on InputBox or CursorState.

/// Border (2) + padding (2) consumed horizontally by the bordered block
pub(super) const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders consumed vertically
pub(super) const VERTICAL_OVERHEAD: u16 = 2;
/// Maximum visible draft lines before internal scrolling kicks in
pub(super) const MAX_VISIBLE_LINES: u16 = 5;
/// Offset from area edge to content (border width)
pub(super) const BORDER_OFFSET: u16 = 1;

/// Textwrap options matching how the draft is displayed.
pub(super) fn wrap_options(inner_width: u16) -> textwrap::Options<'static> {
    textwrap::Options::new(inner_width as usize)
        .break_words(true)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
}

/// Inner content width after borders and padding; 0 if the area is too narrow.
pub(super) fn inner_width(content_width: u16) -> u16 {
    content_width.saturating_sub(HORIZONTAL_OVERHEAD)
}

/// Wrapped line count, including the empty line a trailing newline opens.
pub(super) fn wrap_line_count(text: &str, width: u16) -> u16 {
    if width == 0 || text.is_empty() {
        return 1;
    }

    let lines = textwrap::wrap(text, wrap_options(width));
    let mut count = u16::try_from(lines.len()).unwrap_or(u16::MAX).max(1);

    if text.ends_with('\n') && !lines.last().is_some_and(|l| l.is_empty()) {
        count = count.saturating_add(1);
    }

    count
}

pub(super) fn prev_char_boundary(text: &str, pos: usize) -> usize {
    text[..pos]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

pub(super) fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .char_indices()
        .nth(1)
        .map(|(i, _)| pos + i)
        .unwrap_or(text.len())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Start of the word before `pos`, readline `backward-word` style:
/// skip separators, then the word itself.
pub(super) fn prev_word_boundary(text: &str, pos: usize) -> usize {
    let mut chars = text[..pos].char_indices().rev().peekable();

    while chars.peek().is_some_and(|&(_, c)| !is_word_char(c)) {
        chars.next();
    }

    let mut boundary = 0;
    while let Some(&(i, c)) = chars.peek() {
        if !is_word_char(c) {
            boundary = i + c.len_utf8();
            break;
        }
        boundary = i;
        chars.next();
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_line_count_cases() {
        assert_eq!(wrap_line_count("", 80), 1);
        assert_eq!(wrap_line_count("hello", 0), 1);
        assert_eq!(wrap_line_count("hello", 80), 1);
        assert_eq!(wrap_line_count("aaaaaaaaaa", 5), 2);
        assert_eq!(wrap_line_count("a\nb\nc", 80), 3);
    }

    #[test]
    fn wrap_line_count_trailing_newline_adds_line() {
        assert_eq!(wrap_line_count("hello\n", 80), 2);
        assert_eq!(wrap_line_count("aaaaaaaaaa\n", 5), 3);
    }

    #[test]
    fn char_boundaries_respect_multibyte() {
        let s = "a🔥é";
        assert_eq!(next_char_boundary(s, 0), 1);
        assert_eq!(next_char_boundary(s, 1), 5);
        assert_eq!(prev_char_boundary(s, s.len()), 5);
        assert_eq!(prev_char_boundary(s, 5), 1);
        assert_eq!(prev_char_boundary(s, 1), 0);
    }

    #[test]
    fn prev_word_boundary_cases() {
        assert_eq!(prev_word_boundary("hello world", 11), 6);
        assert_eq!(prev_word_boundary("hello world", 8), 6);
        assert_eq!(prev_word_boundary("hello   world", 8), 0);
        assert_eq!(prev_word_boundary("foo.bar", 7), 4);
        assert_eq!(prev_word_boundary("snake_case word", 10), 0);
        assert_eq!(prev_word_boundary("café latte", "café latte".len()), 6);
        assert_eq!(prev_word_boundary("", 0), 0);
    }
}
