//! Per-connection stream decoder
//!
//! Reads never line up with message boundaries: one read may end in the
//! middle of a message, another may carry several messages at once.
//! [`StreamDecoder`] keeps the unterminated tail between calls and only
//! parses complete lines.

use crate::codecs::{Frame, LineCodec};
use crate::messages::{parse_broadcasts, Broadcast};
use bytes::BytesMut;
use netsync_core::{NetSyncError, Result};
use tokio_util::codec::Decoder;

/// Result of feeding one chunk to a [`StreamDecoder`]
#[derive(Debug, Default)]
pub struct Decoded {
    /// Well-formed broadcasts, in wire order
    pub broadcasts: Vec<Broadcast>,

    /// Per-message failures; none of them stopped decoding
    pub failures: Vec<NetSyncError>,

    /// Number of complete lines consumed
    pub lines: usize,
}

impl Decoded {
    pub fn is_empty(&self) -> bool {
        self.broadcasts.is_empty() && self.failures.is_empty()
    }
}

/// Accumulating decoder for one connection
#[derive(Debug)]
pub struct StreamDecoder {
    codec: LineCodec,
    buffer: BytesMut,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::with_codec(LineCodec::new())
    }

    pub fn with_codec(codec: LineCodec) -> Self {
        Self {
            codec,
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append raw bytes without decoding them
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete frame, if the buffer holds one
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.codec.decode(&mut self.buffer)
    }

    /// Append `chunk` and decode every complete line now available
    ///
    /// The trailing partial line, if any, stays buffered (see
    /// [`remainder`](Self::remainder)) and is prefixed to the next chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> Decoded {
        self.extend(chunk);

        let mut decoded = Decoded::default();
        loop {
            match self.next_frame() {
                Ok(Some(frame)) => Self::collect(frame, &mut decoded),
                Ok(None) => break,
                Err(e) => {
                    decoded.failures.push(e);
                    break;
                }
            }
        }
        decoded
    }

    /// Flush the buffer at end of stream, reporting any unterminated tail
    pub fn finish(&mut self) -> Decoded {
        let mut decoded = Decoded::default();
        loop {
            match self.codec.decode_eof(&mut self.buffer) {
                Ok(Some(frame)) => Self::collect(frame, &mut decoded),
                Ok(None) => break,
                Err(e) => {
                    decoded.failures.push(e);
                    break;
                }
            }
        }
        decoded
    }

    /// Bytes received after the last delimiter
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    fn collect(frame: Frame, decoded: &mut Decoded) {
        match frame {
            Frame::Line(line) => {
                decoded.lines += 1;
                for result in parse_broadcasts(&line) {
                    match result {
                        Ok(broadcast) => decoded.broadcasts.push(broadcast),
                        Err(e) => decoded.failures.push(e),
                    }
                }
            }
            Frame::Oversized { discarded } => {
                decoded.failures.push(NetSyncError::InvalidData(format!(
                    "Discarded oversized line ({} bytes)",
                    discarded
                )));
            }
            Frame::Truncated { remaining } => {
                decoded.failures.push(NetSyncError::InvalidData(format!(
                    "Stream ended inside a message ({} bytes)",
                    remaining
                )));
            }
        }
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}
