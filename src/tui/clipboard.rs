//! System clipboard access and paste classification.
//!
//! Terminals deliver pastes as text, so an image reaches us one of two
//! ways: as file paths in a bracketed paste (drag-and-drop into the
//! terminal does this), or as image data on the system clipboard, which
//! Ctrl+V reads through `arboard`.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, info};

use crate::core::attachment::{Attachment, is_pasteable_type, media_type_for_path};
use crate::core::input::ClipboardItem;

#[derive(Debug)]
pub enum ClipboardError {
    Unavailable(String),
    Encode(String),
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardError::Unavailable(msg) => write!(f, "Clipboard unavailable: {msg}"),
            ClipboardError::Encode(msg) => write!(f, "Could not read clipboard image: {msg}"),
        }
    }
}

impl std::error::Error for ClipboardError {}

pub fn copy_text(text: &str) -> Result<(), ClipboardError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    clipboard
        .set_text(text.to_owned())
        .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    info!("Copied {} chars to clipboard", text.chars().count());
    Ok(())
}

/// Reads the clipboard image, re-encoded as PNG. `Ok(None)` when there is no image.
pub fn read_image_png() -> Result<Option<Vec<u8>>, ClipboardError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    let data = match clipboard.get_image() {
        Ok(data) => data,
        Err(arboard::Error::ContentNotAvailable) => return Ok(None),
        Err(e) => return Err(ClipboardError::Unavailable(e.to_string())),
    };

    let rgba = RgbaImage::from_raw(
        data.width as u32,
        data.height as u32,
        data.bytes.into_owned(),
    )
    .ok_or_else(|| ClipboardError::Encode("pixel buffer size mismatch".to_string()))?;

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ClipboardError::Encode(e.to_string()))?;
    debug!("Clipboard image encoded: {} bytes", png.len());
    Ok(Some(png))
}

/// Splits a bracketed paste into items.
///
/// Every non-empty line that names an existing image file becomes a file
/// item. Anything else keeps the whole paste as text.
pub fn classify_paste(text: &str) -> Vec<ClipboardItem> {
    let lines: Vec<&str> = text
        .lines()
        .map(|l| unquote(l.trim()))
        .filter(|l| !l.is_empty())
        .collect();

    let all_images = !lines.is_empty()
        && lines.iter().all(|line| {
            let path = Path::new(line);
            path.is_file() && is_pasteable_type(media_type_for_path(path))
        });
    if !all_images {
        return vec![ClipboardItem::Text(text.to_string())];
    }

    lines
        .into_iter()
        .map(|line| match Attachment::from_path(line) {
            Ok(file) => ClipboardItem::File(file),
            Err(_) => ClipboardItem::Text(line.to_string()),
        })
        .collect()
}

/// Splits typed or dropped paths shell-style: whitespace separates paths,
/// quotes and backslash escapes keep spaces inside one.
pub fn split_paths(input: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_token = true;
            }
            (None, '\'' | '"') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    paths.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        paths.push(current);
    }

    paths
        .into_iter()
        .map(|p| match p.strip_prefix("file://") {
            Some(rest) => rest.to_string(),
            None => p,
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Strips the quotes and `file://` prefix that terminals add to dropped paths.
fn unquote(s: &str) -> &str {
    let s = s
        .strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
        .unwrap_or(s);
    s.strip_prefix("file://").unwrap_or(s)
}
