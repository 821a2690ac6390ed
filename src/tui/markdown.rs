//! Markdown → ratatui `Text` renderer.
//!
//! Converts `pulldown_cmark` events into styled `Line`/`Span` values:
//! headings, emphasis, inline code, fenced code blocks (highlighted with
//! syntect), lists, blockquotes, links and GFM tables. Assistant answers
//! and reasoning traces both go through here, each with its own base style.

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const CODE_THEME: &str = "base16-ocean.dark";

fn frame_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

/// Parse markdown into owned `Text`, with `base` applied to plain runs.
pub fn render(content: &str, base: Style) -> Text<'static> {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts.insert(Options::ENABLE_TABLES);

    let mut w = Writer::new(base);
    for event in Parser::new_ext(content, opts) {
        w.handle(event);
    }
    w.text
}

struct Writer {
    text: Text<'static>,
    base: Style,
    /// Inline style stack; entries compose via `patch` so bold+italic nests.
    styles: Vec<Style>,
    /// Per-line prefix spans (blockquote and code block rails).
    line_prefixes: Vec<Span<'static>>,
    /// List nesting: None = unordered, Some(n) = ordered at index n.
    list_indices: Vec<Option<u64>>,
    highlighter: Option<HighlightLines<'static>>,
    in_plain_code: bool,
    /// Link target, appended after the link text closes.
    link_url: Option<String>,
    /// Cells of the table row being built.
    table_row: Option<Vec<String>>,
    needs_blank: bool,
}

impl Writer {
    fn new(base: Style) -> Self {
        Self {
            text: Text::default(),
            base,
            styles: vec![],
            line_prefixes: vec![],
            list_indices: vec![],
            highlighter: None,
            in_plain_code: false,
            link_url: None,
            table_row: None,
            needs_blank: false,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or(self.base)
    }

    fn push_style(&mut self, overlay: Style) {
        self.styles.push(self.style().patch(overlay));
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn push_line(&mut self, line: Line<'static>) {
        let mut out = line;
        for pfx in self.line_prefixes.iter().rev().cloned() {
            out.spans.insert(0, pfx);
        }
        self.text.lines.push(out);
    }

    fn push_span(&mut self, span: Span<'static>) {
        if let Some(line) = self.text.lines.last_mut() {
            line.push_span(span);
        } else {
            self.push_line(Line::from(vec![span]));
        }
    }

    fn blank_line_if_needed(&mut self) {
        if self.needs_blank {
            self.push_line(Line::default());
            self.needs_blank = false;
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(tag) => self.close(tag),
            Event::Text(t) => self.text(t),
            Event::Code(c) => self.inline_code(c),
            Event::SoftBreak => self.push_span(Span::raw(" ")),
            Event::HardBreak => self.push_line(Line::default()),
            Event::Rule => {
                self.blank_line_if_needed();
                self.push_line(Line::from(Span::styled("─".repeat(40), frame_style())));
                self.needs_blank = true;
            }
            Event::TaskListMarker(checked) => {
                self.push_span(Span::raw(if checked { "[x] " } else { "[ ] " }));
            }
            _ => {}
        }
    }

    fn open(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.blank_line_if_needed();
                self.push_line(Line::default());
            }
            Tag::Heading { level, .. } => {
                self.blank_line_if_needed();
                let hs = heading_style(self.base, level);
                self.push_line(Line::from(Span::styled(
                    format!("{} ", "#".repeat(level as usize)),
                    hs,
                )));
                self.push_style(hs);
            }
            Tag::BlockQuote(_) => {
                self.blank_line_if_needed();
                self.line_prefixes.push(Span::styled("│ ", frame_style()));
                self.push_style(Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => self.open_code_block(kind),
            Tag::List(start) => {
                if self.list_indices.is_empty() {
                    self.blank_line_if_needed();
                }
                self.list_indices.push(start);
            }
            Tag::Item => {
                self.push_line(Line::default());
                let indent = "  ".repeat(self.list_indices.len().saturating_sub(1));
                if let Some(idx) = self.list_indices.last_mut() {
                    let marker = match idx {
                        None => format!("{indent}• "),
                        Some(n) => {
                            let s = format!("{indent}{n}. ");
                            *n += 1;
                            s
                        }
                    };
                    self.push_span(Span::styled(marker, frame_style()));
                }
            }
            Tag::Table(_) => self.blank_line_if_needed(),
            Tag::TableHead | Tag::TableRow => self.table_row = Some(Vec::new()),
            Tag::TableCell => {
                if let Some(row) = self.table_row.as_mut() {
                    row.push(String::new());
                }
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.link_url = Some(dest_url.to_string());
                self.push_style(link_style());
            }
            _ => {}
        }
    }

    fn open_code_block(&mut self, kind: CodeBlockKind<'_>) {
        if !self.text.lines.is_empty() {
            self.push_line(Line::default());
        }
        let lang = match &kind {
            CodeBlockKind::Fenced(l) => l.split_whitespace().next().unwrap_or(""),
            CodeBlockKind::Indented => "",
        };

        let bs = frame_style();
        let top = if lang.is_empty() {
            Line::from(Span::styled("╭──", bs))
        } else {
            Line::from(vec![
                Span::styled("╭── ", bs),
                Span::styled(lang.to_owned(), bs.add_modifier(Modifier::BOLD)),
                Span::styled(" ──", bs),
            ])
        };
        self.push_line(top);
        self.line_prefixes.push(Span::styled("│ ", bs));

        if !lang.is_empty()
            && let Some(syntax) = SYNTAX_SET.find_syntax_by_token(lang)
            && let Some(theme) = THEME_SET.themes.get(CODE_THEME)
        {
            self.highlighter = Some(HighlightLines::new(syntax, theme));
        }
        self.in_plain_code = self.highlighter.is_none();
    }

    fn close(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.needs_blank = true,
            TagEnd::Heading(_) => {
                self.pop_style();
                self.needs_blank = true;
            }
            TagEnd::BlockQuote(_) => {
                self.line_prefixes.pop();
                self.pop_style();
                self.needs_blank = true;
            }
            TagEnd::CodeBlock => {
                self.highlighter = None;
                self.in_plain_code = false;
                self.line_prefixes.pop();
                self.push_line(Line::from(Span::styled("╰──", frame_style())));
                self.needs_blank = true;
            }
            TagEnd::List(_) => {
                self.list_indices.pop();
                self.needs_blank = true;
            }
            TagEnd::TableHead => self.flush_table_row(true),
            TagEnd::TableRow => self.flush_table_row(false),
            TagEnd::Table => self.needs_blank = true,
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link_url.take() {
                    self.push_span(Span::raw(" ("));
                    self.push_span(Span::styled(url, link_style()));
                    self.push_span(Span::raw(")"));
                }
            }
            _ => {}
        }
    }

    fn flush_table_row(&mut self, header: bool) {
        let Some(cells) = self.table_row.take() else {
            return;
        };
        let cell_style = if header {
            self.base.add_modifier(Modifier::BOLD)
        } else {
            self.base
        };
        let mut spans = Vec::with_capacity(cells.len() * 2);
        for (i, cell) in cells.into_iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", frame_style()));
            }
            spans.push(Span::styled(cell, cell_style));
        }
        self.push_line(Line::from(spans));
        if header {
            self.push_line(Line::from(Span::styled("─".repeat(24), frame_style())));
        }
    }

    fn text(&mut self, cow: CowStr<'_>) {
        // ratatui renders \t as zero-width
        let text = cow.replace('\t', "    ");

        if let Some(row) = self.table_row.as_mut() {
            if let Some(cell) = row.last_mut() {
                cell.push_str(&text);
            }
            return;
        }

        if let Some(mut hl) = self.highlighter.take() {
            for line in LinesWithEndings::from(text.as_str()) {
                let Ok(ranges) = hl.highlight_line(line, &SYNTAX_SET) else {
                    continue;
                };
                let spans: Vec<Span<'static>> = ranges
                    .into_iter()
                    .filter_map(|(style, frag)| {
                        let content = frag.trim_end_matches('\n');
                        (!content.is_empty()).then(|| {
                            let fg = Color::Rgb(
                                style.foreground.r,
                                style.foreground.g,
                                style.foreground.b,
                            );
                            Span::styled(content.to_owned(), Style::default().fg(fg))
                        })
                    })
                    .collect();
                self.push_line(Line::from(spans));
            }
            self.highlighter = Some(hl);
            return;
        }

        if self.in_plain_code {
            let code_style = Style::default().fg(Color::White);
            for line in text.lines() {
                self.push_line(Line::from(Span::styled(line.to_owned(), code_style)));
            }
            return;
        }

        let style = self.style();
        self.push_span(Span::styled(text, style));
    }

    fn inline_code(&mut self, cow: CowStr<'_>) {
        if let Some(cell) = self.table_row.as_mut().and_then(|row| row.last_mut()) {
            cell.push_str(&cow);
            return;
        }
        let style = Style::default().fg(Color::White).bg(Color::DarkGray);
        self.push_span(Span::styled(cow.to_string(), style));
    }
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED)
}

fn heading_style(base: Style, level: HeadingLevel) -> Style {
    let modifier = match level {
        HeadingLevel::H1 => Modifier::BOLD | Modifier::UNDERLINED,
        HeadingLevel::H2 => Modifier::BOLD,
        _ => Modifier::BOLD | Modifier::ITALIC,
    };
    base.add_modifier(modifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(text: &Text<'_>) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn base() -> Style {
        Style::default().fg(Color::Blue)
    }

    #[test]
    fn heading_text_inherits_heading_style() {
        let text = render("## Hello", base());
        let line = &text.lines[0];
        assert!(line.spans.len() >= 2, "expected >= 2 spans, got {:?}", line);
        assert!(line.spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[1].style.fg, Some(Color::Blue));
    }

    #[test]
    fn bold_text_is_bold() {
        let text = render("Some **bold** text", base());
        let bold = text.lines[0].spans.iter().find(|s| s.content == "bold");
        assert!(bold.is_some_and(|s| s.style.add_modifier.contains(Modifier::BOLD)));
    }

    #[test]
    fn base_style_modifiers_carry_into_text() {
        let reasoning = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
        let text = render("pondering", reasoning);
        let span = &text.lines[0].spans[0];
        assert_eq!(span.style.fg, Some(Color::DarkGray));
        assert!(span.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn code_block_has_border_structure() {
        let lines = flat(&render("```\nline1\nline2\n```", base()));
        assert!(lines[0].starts_with('╭'), "expected top border, got {:?}", lines[0]);
        assert!(lines[1].starts_with("│ ") && lines[1].contains("line1"));
        assert!(lines[2].starts_with("│ ") && lines[2].contains("line2"));
        assert!(lines.last().is_some_and(|l| l.starts_with('╰')));
    }

    #[test]
    fn fenced_language_is_labelled() {
        let lines = flat(&render("```rust\nfn main() {}\n```", base()));
        assert!(lines[0].contains("rust"));
        assert!(lines.iter().any(|l| l.contains("fn main")));
    }

    #[test]
    fn tabs_expanded_to_spaces() {
        let lines = flat(&render("```\n\tindented\n```", base()));
        assert!(lines.iter().any(|l| l.contains("    indented")));
        assert!(!lines.iter().any(|l| l.contains('\t')));
    }

    #[test]
    fn table_rows_render_with_separators() {
        let lines = flat(&render("| a | b |\n|---|---|\n| 1 | 2 |", base()));
        assert!(lines.iter().any(|l| l == "a │ b"), "got {:?}", lines);
        assert!(lines.iter().any(|l| l == "1 │ 2"), "got {:?}", lines);
    }

    #[test]
    fn link_target_follows_text() {
        let lines = flat(&render("[docs](https://example.com)", base()));
        assert_eq!(lines[0], "docs (https://example.com)");
    }
}
