//! Inline image previews drawn with half-block characters.
//!
//! Each terminal cell shows two vertically stacked pixels: `▀` with the
//! upper pixel as foreground and the lower one as background. Decoding is
//! the expensive part, so rendered previews are cached per file part.

use std::collections::HashMap;

use image::{DynamicImage, GenericImageView, Rgba};
use log::{debug, warn};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::inference::data_url::DataUrl;

const UPPER_HALF: &str = "▀";

/// Decodes any format the `image` crate was built with.
pub fn decode(bytes: &[u8]) -> Option<DynamicImage> {
    match image::load_from_memory(bytes) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("Image decode failed: {}", e);
            None
        }
    }
}

/// Scales `img` to fit `max_cols` × `max_rows` cells, keeping its aspect ratio.
pub fn half_blocks(img: &DynamicImage, max_cols: u16, max_rows: u16) -> Vec<Line<'static>> {
    if max_cols == 0 || max_rows == 0 {
        return Vec::new();
    }
    let scaled = img.thumbnail(u32::from(max_cols), u32::from(max_rows) * 2);
    let (width, height) = scaled.dimensions();

    (0..height)
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span<'static>> = (0..width)
                .map(|x| {
                    let top = scaled.get_pixel(x, y);
                    let bottom = if y + 1 < height {
                        Some(scaled.get_pixel(x, y + 1))
                    } else {
                        None
                    };
                    let mut style = Style::default().fg(to_color(top));
                    if let Some(bottom) = bottom {
                        style = style.bg(to_color(bottom));
                    }
                    Span::styled(UPPER_HALF, style)
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn to_color(pixel: Rgba<u8>) -> Color {
    let [r, g, b, a] = pixel.0;
    // Blend toward black so transparent regions read as background.
    let blend = |c: u8| ((u16::from(c) * u16::from(a)) / 255) as u8;
    Color::Rgb(blend(r), blend(g), blend(b))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ThumbKey {
    message_id: String,
    part_index: usize,
    cols: u16,
    rows: u16,
}

/// Rendered previews keyed by message, part and size. Failures are cached too.
#[derive(Default)]
pub struct ThumbnailCache {
    entries: HashMap<ThumbKey, Option<Vec<Line<'static>>>>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the preview for one file part, decoding its data URL on first use.
    pub fn get_or_render(
        &mut self,
        message_id: &str,
        part_index: usize,
        url: &str,
        cols: u16,
        rows: u16,
    ) -> Option<&[Line<'static>]> {
        let key = ThumbKey {
            message_id: message_id.to_string(),
            part_index,
            cols,
            rows,
        };
        self.entries
            .entry(key)
            .or_insert_with(|| {
                debug!(
                    "Rendering thumbnail for {}#{} at {}x{}",
                    message_id, part_index, cols, rows
                );
                let bytes = DataUrl::parse(url)?.bytes()?;
                let img = decode(&bytes)?;
                Some(half_blocks(&img, cols, rows))
            })
            .as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
