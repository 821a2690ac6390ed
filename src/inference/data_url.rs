//! `data:` URL helpers. File parts carry their bytes inline this way so a
//! message log is self-contained and needs no external storage.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A borrowed view of a `data:<media-type>[;base64],<payload>` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub media_type: &'a str,
    pub is_base64: bool,
    pub payload: &'a str,
}

impl<'a> DataUrl<'a> {
    pub fn parse(url: &'a str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let (media_type, is_base64) = match header.strip_suffix(";base64") {
            Some(mt) => (mt, true),
            None => (header, false),
        };
        let media_type = if media_type.is_empty() {
            "text/plain"
        } else {
            media_type
        };
        Some(Self {
            media_type,
            is_base64,
            payload,
        })
    }

    /// Decoded payload bytes. `None` if the base64 is corrupt.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        if self.is_base64 {
            STANDARD.decode(self.payload).ok()
        } else {
            Some(self.payload.as_bytes().to_vec())
        }
    }

    /// Size of the decoded payload, computed without decoding.
    pub fn decoded_len(&self) -> usize {
        if !self.is_base64 {
            return self.payload.len();
        }
        let padding = self.payload.bytes().rev().take_while(|b| *b == b'=').count();
        (self.payload.len() / 4 * 3).saturating_sub(padding)
    }
}

/// The header that precedes base64 content for `media_type`.
pub fn header(media_type: &str) -> String {
    format!("data:{media_type};base64,")
}

/// Builds a complete base64 data URL from in-memory bytes.
pub fn from_bytes(media_type: &str, bytes: &[u8]) -> String {
    let mut url = header(media_type);
    STANDARD.encode_string(bytes, &mut url);
    url
}
