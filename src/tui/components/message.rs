//! # Message Component
//!
//! Draws one `MessageView` as a bordered card. The card's body is built
//! once as owned `Text` by [`build_text`], so the list can measure it with
//! the same wrapping it renders with.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Padding, Paragraph, Widget, Wrap};

use crate::core::attachment::FileKind;
use crate::core::view::{Block as ViewBlock, Citation, MessageView};
use crate::inference::{MessageLog, Part, Role};
use crate::tui::component::Component;
use crate::tui::markdown;
use crate::tui::thumbnail::ThumbnailCache;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Total horizontal space consumed by borders (1 left + 1 right) and padding.
pub const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Total vertical space consumed by borders (1 top + 1 bottom).
const VERTICAL_OVERHEAD: u16 = 2;

const THUMBNAIL_MAX_COLS: u16 = 32;
const THUMBNAIL_MAX_ROWS: u16 = 8;

/// Pulse intensity threshold above which the border transitions from normal to BOLD.
const PULSE_BOLD_THRESHOLD: f32 = 0.6;
/// Pulse intensity threshold above which the border transitions from DIM to normal.
const PULSE_NORMAL_THRESHOLD: f32 = 0.2;

/// Transient per-card toggles that live in the TUI, not in the view model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CardFlags {
    /// Reasoning and citations are shown in full.
    pub expanded: bool,
    /// The copy action was used within the last second.
    pub copied: bool,
}

pub fn role_title(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "lumen",
        Role::System => "system",
    }
}

pub fn role_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Green),
        Role::Assistant => Style::default().fg(Color::Blue),
        Role::System => Style::default().fg(Color::Yellow),
    }
}

fn muted() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn reasoning_style() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC)
}

/// Looks up the data URL behind a file block.
fn file_url<'l>(log: &'l MessageLog, message_id: &str, part_index: usize) -> Option<&'l str> {
    let message = log.messages.iter().find(|m| m.id == message_id)?;
    match message.parts.get(part_index)? {
        Part::File { url, .. } => Some(url.as_str()),
        _ => None,
    }
}

/// Builds the card body for `view` at the given outer width.
pub fn build_text(
    view: &MessageView,
    log: &MessageLog,
    thumbnails: &mut ThumbnailCache,
    flags: CardFlags,
    width: u16,
) -> Text<'static> {
    let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
    let base = role_style(view.role);
    let mut lines: Vec<Line<'static>> = Vec::new();

    for block in &view.blocks {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        match block {
            ViewBlock::Text { text } => {
                lines.extend(markdown::render(text.trim(), base).lines);
            }
            ViewBlock::Reasoning { text, streaming } => {
                reasoning_lines(&mut lines, text, *streaming, flags.expanded);
            }
            ViewBlock::Image {
                part_index,
                filename,
            } => {
                let preview = file_url(log, &view.id, *part_index).and_then(|url| {
                    thumbnails.get_or_render(
                        &view.id,
                        *part_index,
                        url,
                        content_width.min(THUMBNAIL_MAX_COLS),
                        THUMBNAIL_MAX_ROWS,
                    )
                });
                match preview {
                    Some(rows) if !rows.is_empty() => {
                        lines.extend(rows.iter().cloned());
                        lines.push(Line::from(Span::styled(format!("▣ {filename}"), muted())));
                    }
                    _ => lines.push(Line::from(Span::styled(
                        format!("▣ {filename} (preview unavailable)"),
                        muted(),
                    ))),
                }
            }
            ViewBlock::FileCard { filename, kind, .. } => {
                lines.push(file_card_line(filename, *kind));
            }
            ViewBlock::Citations { sources } => {
                citation_lines(&mut lines, sources, flags.expanded);
            }
        }
    }

    if view.actions.is_some() {
        lines.push(Line::default());
        lines.push(actions_line(flags.copied));
    }

    Text::from(lines)
}

fn reasoning_lines(lines: &mut Vec<Line<'static>>, text: &str, streaming: bool, expanded: bool) {
    let header_style = reasoning_style().add_modifier(Modifier::BOLD);
    if streaming {
        lines.push(Line::from(Span::styled("◌ Thinking...", header_style)));
    } else if expanded {
        lines.push(Line::from(Span::styled("▾ Reasoning", header_style)));
    } else {
        let words = text.split_whitespace().count();
        lines.push(Line::from(Span::styled(
            format!("▸ Reasoning · {words} words"),
            header_style,
        )));
        return;
    }
    lines.extend(markdown::render(text.trim(), reasoning_style()).lines);
}

fn file_card_line(filename: &str, kind: FileKind) -> Line<'static> {
    let icon = match kind {
        FileKind::Image => "▣",
        FileKind::Pdf => "▤",
        FileKind::Text => "≡",
        FileKind::Unknown => "□",
    };
    Line::from(vec![
        Span::styled(format!("{icon} "), Style::default().fg(Color::Magenta)),
        Span::styled(filename.to_owned(), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}", kind.label()), muted()),
    ])
}

fn citation_lines(lines: &mut Vec<Line<'static>>, sources: &[Citation], expanded: bool) {
    let noun = if sources.len() == 1 { "source" } else { "sources" };
    let marker = if expanded { "▾" } else { "▸" };
    lines.push(Line::from(Span::styled(
        format!("{marker} Used {} {noun}", sources.len()),
        Style::default().fg(Color::Cyan),
    )));
    if !expanded {
        return;
    }
    let link = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED);
    for (i, source) in sources.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("  {}. ", i + 1), muted()),
            Span::raw(source.label().to_owned()),
        ]));
        if source.title.is_some() {
            lines.push(Line::from(Span::styled(format!("     {}", source.url), link)));
        }
    }
}

fn actions_line(copied: bool) -> Line<'static> {
    let key = Style::default().fg(Color::Yellow);
    let mut spans = vec![
        Span::styled("↻ Retry ", muted()),
        Span::styled("Ctrl+R", key),
        Span::raw("   "),
    ];
    if copied {
        spans.push(Span::styled("✓ Copied", Style::default().fg(Color::Green)));
    } else {
        spans.push(Span::styled("⧉ Copy ", muted()));
        spans.push(Span::styled("Ctrl+Y", key));
    }
    Line::from(spans)
}

/// A transient card widget, created fresh each frame by `MessageList`.
#[derive(Clone)]
pub struct Message {
    pub role: Role,
    pub text: Text<'static>,
    pub is_selected: bool,
    /// Current pulse intensity (0.0 to 1.0) for active generation animation
    pub pulse_intensity: f32,
}

impl Message {
    pub fn new(role: Role, text: Text<'static>, is_selected: bool, pulse_intensity: f32) -> Self {
        Self {
            role,
            text,
            is_selected,
            pulse_intensity,
        }
    }

    /// Height of a card holding `text` at `width`, borders included.
    ///
    /// Measured with the same `Paragraph` wrapping that `render` uses, so
    /// the list can lay out its scroll canvas before drawing anything.
    pub fn calculate_height(text: &Text<'_>, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            return 1;
        }
        if text.lines.is_empty() {
            return VERTICAL_OVERHEAD;
        }
        let lines = Paragraph::new(text.clone())
            .wrap(Wrap { trim: false })
            .line_count(content_width);
        u16::try_from(lines).unwrap_or(u16::MAX - VERTICAL_OVERHEAD).max(1) + VERTICAL_OVERHEAD
    }
}

impl Widget for Message {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let style = role_style(self.role);

        let mut border_style = if self.is_selected {
            Style::default().fg(Color::Cyan)
        } else {
            style.add_modifier(Modifier::DIM)
        };

        // Three-phase breathing: DIM → normal → BOLD in the role's own color
        if self.pulse_intensity > PULSE_BOLD_THRESHOLD {
            border_style = border_style
                .remove_modifier(Modifier::DIM)
                .add_modifier(Modifier::BOLD);
        } else if self.pulse_intensity > PULSE_NORMAL_THRESHOLD {
            border_style = border_style.remove_modifier(Modifier::DIM);
        }

        let block = Block::bordered()
            .title(role_title(self.role))
            .border_type(ratatui::widgets::BorderType::Rounded)
            .border_style(border_style)
            .title_style(border_style)
            .padding(Padding::horizontal(CONTENT_PAD_H));

        let inner_area = block.inner(area);
        block.render(area, buf);

        Paragraph::new(self.text)
            .wrap(Wrap { trim: false })
            .render(inner_area, buf);
    }
}

impl Component for Message {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(self.clone(), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::view::{MessageActions, build_view};
    use crate::inference::{Message as LogMessage, SessionStatus};

    fn flat(text: &Text<'_>) -> String {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn view_of(blocks: Vec<ViewBlock>, actions: bool) -> MessageView {
        MessageView {
            id: "m".to_string(),
            role: Role::Assistant,
            blocks,
            actions: actions.then(|| MessageActions {
                copy_text: "x".to_string(),
            }),
        }
    }

    fn text_for(view: &MessageView, flags: CardFlags) -> String {
        let mut cache = ThumbnailCache::new();
        flat(&build_text(view, &MessageLog::new(), &mut cache, flags, 60))
    }

    #[test]
    fn calculate_height_empty_text_returns_border_height() {
        assert_eq!(Message::calculate_height(&Text::default(), 80), VERTICAL_OVERHEAD);
    }

    #[test]
    fn calculate_height_zero_width_returns_minimum() {
        assert_eq!(Message::calculate_height(&Text::raw("Hello world"), 0), 1);
        assert_eq!(
            Message::calculate_height(&Text::raw("Hello world"), HORIZONTAL_OVERHEAD),
            1
        );
    }

    #[test]
    fn calculate_height_single_line_fits() {
        assert_eq!(
            Message::calculate_height(&Text::raw("Hello"), 80),
            1 + VERTICAL_OVERHEAD
        );
    }

    #[test]
    fn calculate_height_wraps_at_width_boundary() {
        // content width 5: "Hello" | "world"
        assert_eq!(
            Message::calculate_height(&Text::raw("Hello world"), 9),
            2 + VERTICAL_OVERHEAD
        );
    }

    #[test]
    fn test_reasoning_collapses_after_streaming() {
        let reasoning = |streaming| ViewBlock::Reasoning {
            text: "step one then two".to_string(),
            streaming,
        };
        let live = text_for(&view_of(vec![reasoning(true)], false), CardFlags::default());
        assert!(live.contains("Thinking..."));
        assert!(live.contains("step one"));

        let done = text_for(&view_of(vec![reasoning(false)], false), CardFlags::default());
        assert!(done.contains("Reasoning · 4 words"));
        assert!(!done.contains("step one"));

        let open = CardFlags {
            expanded: true,
            copied: false,
        };
        assert!(text_for(&view_of(vec![reasoning(false)], false), open).contains("step one"));
    }

    #[test]
    fn test_citations_collapsed_then_listed() {
        let sources = vec![
            Citation {
                url: "https://a.example".to_string(),
                title: Some("Alpha".to_string()),
            },
            Citation {
                url: "https://b.example".to_string(),
                title: None,
            },
        ];
        let view = view_of(vec![ViewBlock::Citations { sources }], false);
        let collapsed = text_for(&view, CardFlags::default());
        assert!(collapsed.contains("Used 2 sources"));
        assert!(!collapsed.contains("Alpha"));

        let expanded = text_for(
            &view,
            CardFlags {
                expanded: true,
                copied: false,
            },
        );
        assert!(expanded.contains("1. Alpha"));
        assert!(expanded.contains("https://a.example"));
        assert!(expanded.contains("2. https://b.example"));
    }

    #[test]
    fn test_actions_line_reflects_copied_state() {
        let view = view_of(vec![ViewBlock::Text { text: "hi".to_string() }], true);
        assert!(text_for(&view, CardFlags::default()).contains("Copy Ctrl+Y"));
        let copied = CardFlags {
            expanded: false,
            copied: true,
        };
        assert!(text_for(&view, copied).contains("✓ Copied"));
    }

    #[test]
    fn test_file_card_shows_kind_label() {
        let view = view_of(
            vec![ViewBlock::FileCard {
                part_index: 1,
                filename: "report.pdf".to_string(),
                kind: FileKind::Pdf,
            }],
            false,
        );
        assert!(text_for(&view, CardFlags::default()).contains("report.pdf  PDF Document"));
    }

    #[test]
    fn test_undecodable_image_falls_back_to_caption() {
        let files = vec![Part::File {
            media_type: "image/png".to_string(),
            filename: "broken.png".to_string(),
            url: "data:image/png;base64,AAAA".to_string(),
        }];
        let log = MessageLog {
            messages: vec![LogMessage::user("see", files)],
        };
        let view = build_view(&log, SessionStatus::Idle);
        let mut cache = ThumbnailCache::new();
        let text = flat(&build_text(
            &view.messages[0],
            &log,
            &mut cache,
            CardFlags::default(),
            60,
        ));
        assert!(text.contains("broken.png (preview unavailable)"));
    }
}
