//! # File Preview Component
//!
//! Overlay showing the attachments of one message, one file at a time.
//! Opened with `o` on a selected message, dismissed with Esc.
//!
//! Follows the persistent state + transient wrapper pattern:
//! - `FilePreviewState` lives in `TuiState`
//! - `FilePreview` is created each frame with borrowed state

use std::path::{Path, PathBuf};

use log::{info, warn};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};

use crate::core::attachment::{FileKind, file_kind, format_size_mb};
use crate::inference::Message;
use crate::inference::Part;
use crate::inference::data_url::DataUrl;
use crate::tui::event::TuiEvent;
use crate::tui::thumbnail::ThumbnailCache;

/// Size cap for the text dump, in bytes.
const TEXT_PREVIEW_LIMIT: usize = 64 * 1024;

/// One `file` part of the previewed message.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewFile {
    pub part_index: usize,
    pub filename: String,
    pub media_type: String,
    pub url: String,
}

impl PreviewFile {
    pub fn kind(&self) -> FileKind {
        file_kind(&self.filename, Some(&self.media_type))
    }

    fn bytes(&self) -> Option<Vec<u8>> {
        DataUrl::parse(&self.url)?.bytes()
    }

    fn size(&self) -> Option<usize> {
        DataUrl::parse(&self.url).map(|d| d.decoded_len())
    }
}

/// Persistent state for the preview overlay.
pub struct FilePreviewState {
    pub message_id: String,
    pub files: Vec<PreviewFile>,
    pub selected: usize,
    /// Vertical scroll of the text dump
    pub scroll: u16,
    /// Result of the last save, shown in the footer
    pub notice: Option<String>,
}

/// Events emitted by the preview overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewEvent {
    Save,
    Dismiss,
}

impl FilePreviewState {
    /// Collects the file parts of `message`. `None` when it has none.
    pub fn for_message(message: &Message) -> Option<Self> {
        let files: Vec<PreviewFile> = message
            .parts
            .iter()
            .enumerate()
            .filter_map(|(part_index, part)| match part {
                Part::File {
                    media_type,
                    filename,
                    url,
                } => Some(PreviewFile {
                    part_index,
                    filename: filename.clone(),
                    media_type: media_type.clone(),
                    url: url.clone(),
                }),
                _ => None,
            })
            .collect();
        if files.is_empty() {
            return None;
        }
        Some(Self {
            message_id: message.id.clone(),
            files,
            selected: 0,
            scroll: 0,
            notice: None,
        })
    }

    pub fn current(&self) -> &PreviewFile {
        &self.files[self.selected]
    }

    pub fn handle_event(&mut self, event: &TuiEvent) -> Option<PreviewEvent> {
        match event {
            TuiEvent::Escape => Some(PreviewEvent::Dismiss),
            TuiEvent::CursorLeft => {
                self.selected = self.selected.checked_sub(1).unwrap_or(self.files.len() - 1);
                self.scroll = 0;
                self.notice = None;
                None
            }
            TuiEvent::CursorRight => {
                self.selected = (self.selected + 1) % self.files.len();
                self.scroll = 0;
                self.notice = None;
                None
            }
            TuiEvent::CursorUp | TuiEvent::ScrollUp => {
                self.scroll = self.scroll.saturating_sub(1);
                None
            }
            TuiEvent::CursorDown | TuiEvent::ScrollDown => {
                self.scroll = self.scroll.saturating_add(1);
                None
            }
            TuiEvent::InputChar('s') => Some(PreviewEvent::Save),
            _ => None,
        }
    }

    /// Writes the current file's bytes into `dir` under a free name.
    pub fn save_to(&mut self, dir: &Path) -> std::io::Result<PathBuf> {
        let file = self.current();
        let bytes = file.bytes().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "attachment is not inline data")
        })?;
        let path = free_path(dir, &file.filename);
        let result = std::fs::write(&path, bytes);
        match &result {
            Ok(()) => {
                info!("Saved attachment to {}", path.display());
                self.notice = Some(format!("Saved to {}", path.display()));
            }
            Err(e) => {
                warn!("Failed to save attachment {}: {}", path.display(), e);
                self.notice = Some("Save failed".to_string());
            }
        }
        result.map(|()| path)
    }
}

/// `dir/name`, or `dir/stem (n).ext` if that already exists.
fn free_path(dir: &Path, filename: &str) -> PathBuf {
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
        _ => (name.clone(), String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Rough page count: occurrences of `/Type /Page` that aren't `/Type /Pages`.
pub fn estimate_pdf_pages(bytes: &[u8]) -> usize {
    const NEEDLE: &[u8] = b"/Type /Page";
    bytes
        .windows(NEEDLE.len())
        .enumerate()
        .filter(|(i, w)| *w == NEEDLE && bytes.get(i + NEEDLE.len()) != Some(&b's'))
        .count()
}

/// Transient render wrapper for the preview overlay.
pub struct FilePreview<'a> {
    state: &'a mut FilePreviewState,
    thumbnails: &'a mut ThumbnailCache,
}

impl<'a> FilePreview<'a> {
    pub fn new(state: &'a mut FilePreviewState, thumbnails: &'a mut ThumbnailCache) -> Self {
        Self { state, thumbnails }
    }

    fn body(&mut self, inner: Rect) -> Text<'static> {
        let file = self.state.current().clone();
        let muted = Style::default().fg(Color::DarkGray);
        let size = file
            .size()
            .map(|s| format_size_mb(s as u64))
            .unwrap_or_else(|| "unknown size".to_string());

        match file.kind() {
            FileKind::Image => {
                let rows = inner.height.saturating_sub(2);
                match self.thumbnails.get_or_render(
                    &self.state.message_id,
                    file.part_index,
                    &file.url,
                    inner.width,
                    rows,
                ) {
                    Some(lines) => Text::from(lines.to_vec()),
                    None => {
                        Text::from(Line::from(Span::styled("Image could not be decoded.", muted)))
                    }
                }
            }
            FileKind::Pdf => {
                let pages = file.bytes().map(|b| estimate_pdf_pages(&b)).unwrap_or(0);
                let mut lines = vec![
                    Line::from(Span::styled(
                        "PDF document",
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(format!("Size: {size}")),
                ];
                if pages > 0 {
                    lines.push(Line::from(format!("Pages: ~{pages}")));
                }
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    "Press s to save and open it in a PDF viewer.",
                    muted,
                )));
                Text::from(lines)
            }
            FileKind::Text => match file.bytes() {
                Some(bytes) => {
                    let end = bytes.len().min(TEXT_PREVIEW_LIMIT);
                    Text::raw(String::from_utf8_lossy(&bytes[..end]).into_owned())
                }
                None => Text::from(Line::from(Span::styled("File content unavailable.", muted))),
            },
            FileKind::Unknown => Text::from(vec![
                Line::from("This file cannot be previewed."),
                Line::from(Span::styled(format!("{size} · press s to save"), muted)),
            ]),
        }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let overlay = centered_rect(80, 80, area);
        frame.render_widget(Clear, overlay);

        let file = self.state.current();
        let title = if self.state.files.len() > 1 {
            format!(
                " {} ({}/{}) ",
                file.filename,
                self.state.selected + 1,
                self.state.files.len()
            )
        } else {
            format!(" {} ", file.filename)
        };
        let help_text = match &self.state.notice {
            Some(notice) => format!(" {notice} "),
            None if self.state.files.len() > 1 => " ←/→ Switch  s Save  Esc Close ".to_string(),
            None => " s Save  Esc Close ".to_string(),
        };
        let kind = file.kind();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(title)
            .title_alignment(Alignment::Left)
            .title_bottom(Line::from(help_text).centered())
            .padding(Padding::horizontal(1));
        let inner = block.inner(overlay);
        frame.render_widget(block, overlay);

        let body = self.body(inner);
        let paragraph = match kind {
            FileKind::Text => Paragraph::new(body)
                .wrap(Wrap { trim: false })
                .scroll((self.state.scroll, 0)),
            FileKind::Image | FileKind::Pdf | FileKind::Unknown => {
                Paragraph::new(body).alignment(Alignment::Center)
            }
        };
        frame.render_widget(paragraph, inner);
    }
}

/// Compute a centered rect using percentage of the outer rect.
fn centered_rect(percent_x: u16, percent_y: u16, outer: Rect) -> Rect {
    let [_, center_v, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(outer);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(center_v);
    center
}
