//! Server-sent events framing shared by the provider adapters.
//!
//! Bytes are buffered until a full line is available, so multi-byte UTF-8
//! sequences split across network chunks decode correctly. A frame is
//! dispatched on the blank line that ends it, or by [`SseDecoder::finish`]
//! when the body ends without one.

use futures::StreamExt;
use futures::stream::BoxStream;
use log::debug;

use super::provider::RelayError;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the server sent one.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl SseFrame {
    /// OpenAI-style terminator sent by some gateways.
    pub fn is_done_marker(&self) -> bool {
        self.data == "[DONE]"
    }
}

#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw body bytes, returning every frame completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a trailing line and any pending frame at end of body.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).trim_end().to_string();
            if let Some(frame) = self.line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None; // comment / keep-alive
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                // An event line after unterminated data starts a new frame.
                let pending = if self.data.is_empty() { None } else { self.dispatch() };
                self.event = Some(value.to_string());
                pending
            }
            "data" => {
                self.data.push(value.to_string());
                None
            }
            other => {
                debug!("Ignoring SSE field '{}'", other);
                None
            }
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseFrame {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// A streaming HTTP body read as SSE frames.
pub struct SseBody {
    stream: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    done: bool,
    bytes_read: usize,
}

impl SseBody {
    pub fn new(response: reqwest::Response) -> Self {
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Self {
            stream,
            decoder: SseDecoder::new(),
            done: false,
            bytes_read: 0,
        }
    }

    /// Frames completed by the next network chunk. `Ok(None)` once the body is exhausted.
    pub async fn next_frames(&mut self) -> Result<Option<Vec<SseFrame>>, RelayError> {
        if self.done {
            return Ok(None);
        }
        match self.stream.next().await {
            Some(Ok(chunk)) => {
                self.bytes_read += chunk.len();
                debug!("Raw chunk received: {} bytes", chunk.len());
                Ok(Some(self.decoder.push(&chunk)))
            }
            Some(Err(e)) => Err(RelayError::Network(e.to_string())),
            None => {
                self.done = true;
                debug!("Body complete after {} bytes", self.bytes_read);
                Ok(Some(self.decoder.finish().into_iter().collect()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_split_on_blank_line() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: a\ndata: {\"x\":1}\n\ndata: two\n\n");
        assert_eq!(
            frames,
            vec![
                SseFrame {
                    event: Some("a".to_string()),
                    data: "{\"x\":1}".to_string()
                },
                SseFrame {
                    event: None,
                    data: "two".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_partial_lines_are_buffered() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: hel").is_empty());
        assert!(decoder.push(b"lo\n").is_empty());
        let frames = decoder.push(b"\n");
        assert_eq!(frames[0].data, "hello");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let text = "data: caf\u{e9}\n\n".as_bytes();
        let split = text.len() - 3; // inside the two-byte é
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        let frames = decoder.push(&text[split..]);
        assert_eq!(frames[0].data, "caf\u{e9}");
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: done\ndata: {}").is_empty());
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.event.as_deref(), Some("done"));
        assert_eq!(frame.data, "{}");
    }

    #[test]
    fn test_event_line_without_blank_separator_starts_new_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: a\ndata: 1\nevent: b\ndata: 2\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("a"));
        let last = decoder.finish().unwrap();
        assert_eq!(last.event.as_deref(), Some("b"));
        assert_eq!(last.data, "2");
    }

    #[test]
    fn test_comments_and_crlf() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_done_marker());
    }
}
