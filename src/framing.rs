//! LSP framing over a byte stream: `Content-Length: N\r\n\r\n<body>`.

use crate::alloc::{Allocator, SystemAllocator};
use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Builds the outbound frame for a JSON body.
pub fn encode_frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 32);
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    out.extend_from_slice(body);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ReadHeaders,
    ReadBody { content_length: usize },
}

/// Stateful decoder over a session's rolling inbound byte buffer. Feed it
/// bytes as they arrive (in any chunking) and drain complete message
/// bodies with [`FrameDecoder::poll`]. The rolling buffer is the
/// allocator-routed [`ByteBuffer`], not a bare `Vec`.
pub struct FrameDecoder {
    state: State,
    buf: ByteBuffer,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(SystemAllocator))
    }

    pub fn with_allocator(alloc: Arc<dyn Allocator>) -> Self {
        Self {
            state: State::ReadHeaders,
            buf: ByteBuffer::new(alloc),
        }
    }

    /// Appends freshly read bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.append(bytes.iter().copied());
    }

    /// Pulls one complete message body out of the buffer, if one is fully
    /// framed yet. Call repeatedly after each `feed` — multiple frames can
    /// become available from a single read.
    pub fn poll(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.state {
                State::ReadHeaders => {
                    let Some(header_end) = find_header_terminator(self.buf.as_slice()) else {
                        return Ok(None);
                    };
                    let header_block = &self.buf.as_slice()[..header_end];
                    let content_length = parse_content_length(header_block)?;
                    self.buf.drain_front(header_end + 4);
                    self.state = State::ReadBody { content_length };
                }
                State::ReadBody { content_length } => {
                    if self.buf.len() < content_length {
                        return Ok(None);
                    }
                    let body = self.buf.as_slice()[..content_length].to_vec();
                    self.buf.drain_front(content_length);
                    self.state = State::ReadHeaders;
                    return Ok(Some(body));
                }
            }
        }
    }
}

/// Finds the index where the `\r\n\r\n` header terminator begins, if the
/// full header block has arrived yet.
fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_content_length(header_block: &[u8]) -> Result<usize> {
    let text = std::str::from_utf8(header_block)
        .map_err(|_| Error::Transport("header block is not valid UTF-8".into()))?;
    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, ':');
        let (name, value) = match (parts.next(), parts.next()) {
            (Some(name), Some(value)) => (name.trim(), value.trim()),
            _ => return Err(Error::Transport(format!("malformed header line: {line:?}"))),
        };
        if name.eq_ignore_ascii_case("content-length") {
            return value
                .parse::<usize>()
                .map_err(|_| Error::Transport(format!("non-integer Content-Length: {value:?}")));
        }
    }
    Err(Error::Transport("missing Content-Length header".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_frame() {
        let frame = encode_frame(b"{\"a\":1}");
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame);
        assert_eq!(decoder.poll().unwrap(), Some(b"{\"a\":1}".to_vec()));
        assert_eq!(decoder.poll().unwrap(), None);
    }

    #[test]
    fn emits_same_bodies_regardless_of_chunking() {
        let mut s = Vec::new();
        s.extend(encode_frame(b"one"));
        s.extend(encode_frame(b"two"));
        s.extend(encode_frame(b"three"));

        for chunk_size in [1, 2, 3, 7, 1000] {
            let mut decoder = FrameDecoder::new();
            let mut bodies = Vec::new();
            for chunk in s.chunks(chunk_size) {
                decoder.feed(chunk);
                while let Some(body) = decoder.poll().unwrap() {
                    bodies.push(body);
                }
            }
            assert_eq!(
                bodies,
                vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()],
                "chunk_size={chunk_size}"
            );
        }
    }

    #[test]
    fn content_length_header_name_is_case_insensitive() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"content-length: 2\r\n\r\nhi");
        assert_eq!(decoder.poll().unwrap(), Some(b"hi".to_vec()));
    }

    #[test]
    fn missing_content_length_is_a_transport_error() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"X-Foo: bar\r\n\r\n");
        assert!(decoder.poll().is_err());
    }

    #[test]
    fn zero_length_body_frames_empty_body() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"Content-Length: 0\r\n\r\n");
        assert_eq!(decoder.poll().unwrap(), Some(Vec::new()));
    }
}
