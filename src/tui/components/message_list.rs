//! # MessageList Component
//!
//! Scrollable view of the conversation.
//!
//! ## Responsibilities
//!
//! - Display the message cards of a `ConversationView`
//! - Manage scrolling (stick-to-bottom while streaming, manual scroll)
//! - Cache card bodies and heights between frames
//! - Show the loader while a request has been sent but nothing streamed yet
//!
//! ## Architecture
//!
//! `MessageList` is a transient component (created each frame) that wraps
//! `&'a mut MessageListState` (persistent state) and the view model (props).
//! Since `Component::render` takes `&mut self`, the layout cache and scroll
//! state are updated during the render pass.

use std::collections::HashSet;

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::view::{ConversationView, MessageView};
use crate::inference::MessageLog;
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::{CardFlags, Message, build_text};
use crate::tui::event::TuiEvent;
use crate::tui::thumbnail::ThumbnailCache;

const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];
/// Rows reserved under the last card for the loader.
const LOADER_HEIGHT: u16 = 2;

/// Layout and scroll state for the message list.
/// Must be persisted in the parent TuiState.
pub struct MessageListState {
    pub scroll_state: ScrollViewState,
    pub layout: LayoutCache,
    /// When true, auto-scroll to bottom on new content
    pub stick_to_bottom: bool,
    /// Currently selected message index (hover or keyboard navigation)
    pub selected_index: Option<usize>,
    /// Ids of messages whose reasoning and citations are expanded
    pub expanded: HashSet<String>,
    pub thumbnails: ThumbnailCache,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
    /// Content exists below the viewport and auto-scroll is off
    pub has_unseen_content: bool,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::new(),
            stick_to_bottom: true,
            selected_index: None,
            expanded: HashSet::new(),
            thumbnails: ThumbnailCache::new(),
            viewport_height: 0,
            has_unseen_content: false,
        }
    }

    fn max_scroll(&self) -> u16 {
        self.layout
            .total_height()
            .saturating_sub(self.viewport_height)
    }

    /// Clamp scroll offset so it never exceeds the content bounds.
    pub fn clamp_scroll(&mut self) {
        let max_y = self.max_scroll();
        let current = self.scroll_state.offset();
        if current.y > max_y {
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: max_y,
            });
        }
    }

    /// Scroll the viewport so the selected message is fully visible.
    /// If the message is taller than the viewport, align its top edge.
    pub fn scroll_to_selected(&mut self) {
        let Some(idx) = self.selected_index else {
            return;
        };
        let Some(&item_bottom) = self.layout.prefix_heights.get(idx) else {
            return;
        };
        let item_top = if idx == 0 {
            0
        } else {
            self.layout.prefix_heights[idx - 1]
        };
        let offset_y = self.scroll_state.offset().y;

        if item_top < offset_y {
            self.scroll_state.set_offset(Position { x: 0, y: item_top });
            self.stick_to_bottom = false;
        } else if item_bottom > offset_y + self.viewport_height {
            let new_y = item_bottom
                .saturating_sub(self.viewport_height)
                .min(item_top);
            self.scroll_state.set_offset(Position { x: 0, y: new_y });
            self.stick_to_bottom = new_y >= self.max_scroll();
        }
    }

    /// Clamp scroll and re-engage auto-scroll if the user has reached the bottom.
    pub fn repin_if_at_bottom(&mut self) {
        let max_y = self.max_scroll();
        let current = self.scroll_state.offset();
        if current.y >= max_y {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: max_y,
            });
        }
    }

    pub fn select_previous(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let idx = self
            .selected_index
            .map(|i| i.saturating_sub(1))
            .unwrap_or(count - 1);
        self.selected_index = Some(idx.min(count - 1));
        self.scroll_to_selected();
    }

    pub fn select_next(&mut self, count: usize) {
        if let Some(idx) = self.selected_index
            && idx + 1 < count
        {
            self.selected_index = Some(idx + 1);
            self.scroll_to_selected();
        }
    }

    /// Toggles reasoning and citations for one message.
    pub fn toggle_expanded(&mut self, message_id: &str) {
        if !self.expanded.remove(message_id) {
            self.expanded.insert(message_id.to_string());
        }
    }
}

/// Scrollable conversation view component.
/// Created fresh each frame with references to state and data.
pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub view: &'a ConversationView,
    /// Source of attachment bytes for thumbnails
    pub log: &'a MessageLog,
    pub streaming: bool,
    /// The copy action fired within the last second
    pub copied: bool,
    pub pulse_value: f32,
    pub spinner_frame: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(
        state: &'a mut MessageListState,
        view: &'a ConversationView,
        log: &'a MessageLog,
        streaming: bool,
        copied: bool,
        pulse_value: f32,
        spinner_frame: usize,
    ) -> Self {
        Self {
            state,
            view,
            log,
            streaming,
            copied,
            pulse_value,
            spinner_frame,
        }
    }

    fn flags(&self) -> Vec<CardFlags> {
        self.view
            .messages
            .iter()
            .map(|m| CardFlags {
                expanded: self.state.expanded.contains(&m.id),
                copied: self.copied && m.actions.is_some(),
            })
            .collect()
    }
}

impl<'a> Component for MessageList<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let content_width = area.width.saturating_sub(1); // -1 for scrollbar safe area
        let messages = &self.view.messages;
        let num_items = messages.len();
        let flags = self.flags();

        // 1. Refresh the layout cache from the first changed card onward
        let state = &mut *self.state;
        let reusable = state
            .layout
            .reusable_count(messages, &flags, content_width);
        state.layout.truncate(reusable);
        for (view, flag) in messages.iter().zip(&flags).skip(reusable) {
            let text = build_text(view, self.log, &mut state.thumbnails, *flag, content_width);
            let height = Message::calculate_height(&text, content_width);
            state.layout.push(view.clone(), *flag, text, height);
        }
        state.layout.rebuild_prefix_heights(content_width);

        let total_height = state.layout.total_height();
        let loader_rows = if self.view.loader { LOADER_HEIGHT } else { 0 };
        let canvas_height = total_height.saturating_add(loader_rows);

        // 2. Clamp scroll offset to prevent overscrolling past content
        state.viewport_height = area.height;
        if !state.stick_to_bottom {
            state.clamp_scroll();
        }

        let scroll_offset = state.scroll_state.offset().y;
        let visible_range = state.layout.visible_range(scroll_offset, area.height);

        // 3. Render visible cards into a ScrollView
        let mut scroll_view = ScrollView::new(Size::new(content_width, canvas_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Always)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y_offset: u16 = if visible_range.start > 0 {
            state.layout.prefix_heights[visible_range.start - 1]
        } else {
            0
        };

        for i in visible_range {
            let (role, text, height) = {
                let card = &state.layout.cards[i];
                (card.view.role, card.text.clone(), card.height)
            };
            let is_last = i + 1 == num_items;
            let is_selected = state.selected_index == Some(i);
            let pulse = if is_last && self.streaming {
                self.pulse_value
            } else {
                0.0
            };
            let rect = Rect::new(0, y_offset, content_width, height);
            scroll_view.render_widget(Message::new(role, text, is_selected, pulse), rect);
            y_offset = y_offset.saturating_add(height);
        }

        if self.view.loader {
            let glyph = SPINNER[self.spinner_frame % SPINNER.len()];
            let loader = Line::from(vec![
                Span::styled(format!(" {glyph} "), Style::default().fg(Color::Yellow)),
                Span::styled(
                    "Thinking...",
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                ),
            ]);
            scroll_view.render_widget(loader, Rect::new(0, total_height, content_width, 1));
        }

        if state.stick_to_bottom {
            state.scroll_state.scroll_to_bottom();
        }

        frame.render_stateful_widget(scroll_view, area, &mut state.scroll_state);

        let offset = state.scroll_state.offset().y;
        state.has_unseen_content =
            !state.stick_to_bottom && offset < canvas_height.saturating_sub(area.height);
    }
}

impl EventHandler for MessageListState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollToBottom => {
                self.stick_to_bottom = true;
                self.scroll_state.scroll_to_bottom();
            }
            _ => {}
        }
        None
    }
}

/// One measured card.
pub struct CachedCard {
    pub view: MessageView,
    pub flags: CardFlags,
    pub text: Text<'static>,
    pub height: u16,
}

/// Card bodies and heights from previous frames.
///
/// A card is reused while its view and flags are unchanged and the width is
/// the same; everything from the first changed card onward is rebuilt. During
/// streaming that is only the last card.
#[derive(Default)]
pub struct LayoutCache {
    pub cards: Vec<CachedCard>,
    pub prefix_heights: Vec<u16>,
    content_width: u16,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reusable_count(
        &self,
        views: &[MessageView],
        flags: &[CardFlags],
        content_width: u16,
    ) -> usize {
        if self.content_width != content_width {
            return 0;
        }
        self.cards
            .iter()
            .zip(views.iter().zip(flags))
            .take_while(|(card, (view, flag))| card.view == **view && card.flags == **flag)
            .count()
    }

    pub fn truncate(&mut self, len: usize) {
        self.cards.truncate(len);
    }

    pub fn push(&mut self, view: MessageView, flags: CardFlags, text: Text<'static>, height: u16) {
        self.cards.push(CachedCard {
            view,
            flags,
            text,
            height,
        });
    }

    pub fn rebuild_prefix_heights(&mut self, content_width: u16) {
        self.content_width = content_width;
        self.prefix_heights = self
            .cards
            .iter()
            .scan(0u16, |acc, card| {
                *acc = acc.saturating_add(card.height);
                Some(*acc)
            })
            .collect();
    }

    pub fn total_height(&self) -> u16 {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    pub fn visible_range(
        &self,
        scroll_offset: u16,
        viewport_height: u16,
    ) -> std::ops::Range<usize> {
        let buffer = viewport_height / 2;
        let buffered_start = scroll_offset.saturating_sub(buffer);
        let buffered_end = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self
            .prefix_heights
            .partition_point(|&end| end <= buffered_start);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < buffered_end)
            .saturating_add(1)
            .min(self.prefix_heights.len());

        start..end
    }
}
