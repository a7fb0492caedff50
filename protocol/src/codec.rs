//! Framing codecs for the length-prefixed stream transport.
//!
//! A frame is a plain-text header block (`Content-Length: N` plus any other
//! headers, each terminated by a newline) followed by a blank line and
//! exactly `N` bytes of UTF-8 JSON. [`FrameDecoder`] is sans-IO and keeps
//! partial bytes across [`FrameDecoder::feed`] calls, so chunk boundaries
//! can fall anywhere; [`FrameReader`] and [`FrameWriter`] adapt it to async
//! stream endpoints.
//!
//! The socket-frame transport needs none of this: each transport frame is
//! already one complete JSON document.

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::message::Message;

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Serialize a message into a length-prefixed frame.
#[must_use]
pub fn encode_frame(message: &Message) -> Vec<u8> {
    let body = message.to_value().to_string();
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(body.as_bytes());
    frame
}

/// Incremental decoder for length-prefixed frames.
///
/// Stateful: bytes not yet forming a complete frame are retained until the
/// next [`feed`](Self::feed). Corrupt headers and unparseable bodies are
/// skipped, never fatal — the decoder resynchronizes at the next blank-line
/// boundary and the stream continues.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every message whose bytes completed,
    /// in completion order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Message> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            let Some((header_end, boundary_len)) = find_blank_line(&self.buf) else {
                break;
            };

            let declared = parse_content_length(&self.buf[..header_end]);
            let Some(len) = declared.filter(|len| *len <= MAX_FRAME_BYTES) else {
                // Corrupt or oversized header: discard through the boundary
                // and resynchronize. The stream must survive one bad frame.
                tracing::debug!(
                    header_bytes = header_end,
                    "discarding frame with unusable length header"
                );
                self.buf.drain(..header_end + boundary_len);
                continue;
            };

            let body_start = header_end + boundary_len;
            if self.buf.len() < body_start + len {
                // Body still arriving.
                break;
            }

            match serde_json::from_slice::<serde_json::Value>(&self.buf[body_start..body_start + len])
            {
                Ok(value) => match Message::from_value(&value) {
                    Some(message) => out.push(message),
                    None => tracing::trace!("ignoring frame that fits no message shape"),
                },
                Err(e) => tracing::debug!("discarding frame with unparseable body: {e}"),
            }
            self.buf.drain(..body_start + len);
        }

        out
    }
}

/// Find the header/body boundary: `\r\n\r\n`, or a bare `\n\n`.
fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len() {
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        if buf[i..].starts_with(b"\n\n") {
            return Some((i, 2));
        }
    }
    None
}

/// Extract the `Content-Length` value from a header block.
///
/// Header names are matched case-insensitively; unknown headers are ignored.
fn parse_content_length(header: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(header).ok()?;
    for line in text.lines() {
        let Some(colon) = line.find(':') else { continue };
        if line[..colon].trim().eq_ignore_ascii_case("Content-Length") {
            return line[colon + 1..].trim().parse().ok();
        }
    }
    None
}

/// Reads framed messages from an async byte stream.
pub struct FrameReader<R> {
    reader: R,
    decoder: FrameDecoder,
    ready: std::collections::VecDeque<Message>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            ready: std::collections::VecDeque::new(),
        }
    }

    /// Read the next message. Returns `Ok(None)` on EOF (clean shutdown).
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Ok(Some(message));
            }

            let mut chunk = [0u8; READ_CHUNK_BYTES];
            let n = self
                .reader
                .read(&mut chunk)
                .await
                .context("reading frame bytes")?;
            if n == 0 {
                return Ok(None);
            }
            self.ready.extend(self.decoder.feed(&chunk[..n]));
        }
    }
}

/// Writes framed messages to an async byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        self.writer
            .write_all(&encode_frame(message))
            .await
            .context("writing frame")?;
        self.writer.flush().await.context("flushing frame")?;
        Ok(())
    }
}
