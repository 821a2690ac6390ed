use crate::core::state::App;
use crate::core::view::build_view;
use crate::inference::suggestions::STARTER_SUGGESTIONS;
use crate::tui::component::Component;
use crate::tui::components::{FilePreview, LandingPage, MessageList, TitleBar};
use crate::tui::{InputMode, TuiState};

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph};
use unicode_width::UnicodeWidthStr;

/// Screen regions, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenAreas {
    pub title: Rect,
    pub main: Rect,
    pub suggestions: Rect,
    pub error: Rect,
    pub input: Rect,
    pub footer: Rect,
}

/// Follow-up suggestions are shown under a finished conversation.
fn follow_ups_visible(app: &App) -> bool {
    !app.log.is_empty() && !app.suggestions.is_empty() && !app.is_busy()
}

pub fn screen_layout(area: Rect, app: &App, tui: &TuiState) -> ScreenAreas {
    use Constraint::{Length, Min};

    let input_height = if tui.attach_prompt.is_some() {
        3
    } else {
        tui.input_box.calculate_height(area.width)
    };
    let suggestion_rows = if follow_ups_visible(app) {
        u16::try_from(app.suggestions.len() + 1).unwrap_or(u16::MAX)
    } else {
        0
    };
    let error_rows = u16::from(app.error.is_some());

    let [title, main, suggestions, error, input, footer] = Layout::vertical([
        Length(1),
        Min(0),
        Length(suggestion_rows),
        Length(error_rows),
        Length(input_height),
        Length(1),
    ])
    .areas(area);

    ScreenAreas {
        title,
        main,
        suggestions,
        error,
        input,
        footer,
    }
}

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState, spinner_frame: usize) {
    let areas = screen_layout(frame.area(), app, tui);
    let view = build_view(&app.log, app.status);
    let copied = tui.is_copied();

    // Main area - landing page until the first message, then the conversation
    if app.log.is_empty() {
        LandingPage::new(&STARTER_SUGGESTIONS, tui.suggestion_cursor).render(frame, areas.main);
    } else {
        MessageList::new(
            &mut tui.message_list,
            &view,
            &app.log,
            app.status.is_busy(),
            copied,
            tui.pulse_value,
            spinner_frame,
        )
        .render(frame, areas.main);
    }

    TitleBar::new(
        app.model_name.clone(),
        app.status_message.clone(),
        tui.message_list.has_unseen_content,
    )
    .render(frame, areas.title);

    if follow_ups_visible(app) {
        draw_suggestions(frame, areas.suggestions, &app.suggestions, tui.suggestion_cursor);
    }

    if let Some(error) = &app.error {
        draw_error_bar(frame, areas.error, error, app.can_regenerate());
    }

    match &tui.attach_prompt {
        Some(path) => draw_attach_prompt(frame, areas.input, path),
        None => {
            tui.input_box.busy = app.status.is_busy();
            tui.input_box.dimmed = tui.input_mode == InputMode::Cursor;
            tui.input_box.render(frame, areas.input);
        }
    }

    draw_footer(frame, areas.footer, tui);

    // Overlays
    if let Some(preview) = tui.preview.as_mut() {
        FilePreview::new(preview, &mut tui.message_list.thumbnails).render(frame, areas.main);
    }
    if let Some(toast) = tui.toast.as_mut() {
        toast.render(frame, areas.main);
    }
}

fn draw_suggestions(frame: &mut Frame, area: Rect, suggestions: &[String], cursor: Option<usize>) {
    let mut lines = vec![Line::from(Span::styled(
        " Related (Tab to use)",
        Style::default().fg(Color::DarkGray),
    ))];
    for (i, suggestion) in suggestions.iter().enumerate() {
        let style = if cursor == Some(i) {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        lines.push(Line::from(vec![
            Span::styled("  ↳ ", Style::default().fg(Color::DarkGray)),
            Span::styled(suggestion.clone(), style),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_error_bar(frame: &mut Frame, area: Rect, error: &str, can_retry: bool) {
    let hint = if can_retry {
        "  Ctrl+R retry · Esc dismiss"
    } else {
        "  Esc dismiss"
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" ✕ {error}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::styled(hint, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(line, area);
}

fn draw_attach_prompt(frame: &mut Frame, area: Rect, path: &str) {
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Attach files (jpeg, png, pdf) ")
        .title_bottom(Line::from(" Enter attach · Esc cancel ").right_aligned())
        .padding(Padding::horizontal(1));
    let inner = block.inner(area);
    frame.render_widget(Paragraph::new(path).block(block), area);

    let width = u16::try_from(path.width()).unwrap_or(u16::MAX);
    let x = inner.x.saturating_add(width).min(inner.right().saturating_sub(1));
    frame.set_cursor_position((x, inner.y));
}

fn draw_footer(frame: &mut Frame, area: Rect, tui: &TuiState) {
    let hints = if tui.preview.is_some() {
        "←/→ switch file · s save · Esc close"
    } else if tui.attach_prompt.is_some() {
        "Space-separated paths, quote paths with spaces"
    } else {
        match tui.input_mode {
            InputMode::Input => concat!(
                "Enter send · Ctrl+J newline · Ctrl+O attach · ",
                "Ctrl+V paste image · Esc messages"
            ),
            InputMode::Cursor => concat!(
                "↑/↓ select · Space expand · o open files · ",
                "Ctrl+Y copy · Ctrl+R retry · Enter type"
            ),
        }
    };
    frame.render_widget(
        Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray))),
        area,
    );
}

/// Hit test: given a screen Y coordinate, find which message index (if any) is at that position
pub fn hit_test_message(
    screen_y: u16,
    main_area: Rect,
    scroll_offset_y: u16,
    prefix_heights: &[u16],
) -> Option<usize> {
    // Check if mouse is within the main content area
    if screen_y < main_area.y || screen_y >= main_area.y + main_area.height {
        return None;
    }

    // Convert screen Y to content Y (accounting for scroll)
    let content_y = (screen_y - main_area.y).saturating_add(scroll_offset_y);

    // prefix_heights[i] is the bottom edge of card i
    prefix_heights.iter().position(|&bottom| content_y < bottom)
}
