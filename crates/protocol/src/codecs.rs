//! Newline-delimited framing for the NetSync wire protocol
//!
//! Every message on the wire is one line of compact JSON terminated by `\n`.
//! [`LineCodec`] implements [`Decoder`] and [`Encoder`] so it can be used
//! both with a hand-driven buffer ([`crate::StreamDecoder`]) and with
//! `tokio_util::codec::Framed*` adapters.

use crate::messages::{encode_command_into, Command};
use bytes::{Buf, Bytes, BytesMut};
use netsync_core::{NetSyncError, Result};
use std::cmp;
use tokio_util::codec::{Decoder, Encoder};

/// Wire message delimiter
pub const DELIMITER: u8 = b'\n';

/// Default upper bound for a single wire line (64 KiB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// One framing result
///
/// Framing problems are reported as frames rather than decoder errors so that
/// a bad line never tears down the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, without its delimiter (and without a trailing `\r`)
    Line(Bytes),

    /// A line exceeded the length limit and was dropped up to its delimiter
    Oversized { discarded: usize },

    /// The stream ended in the middle of a line
    Truncated { remaining: usize },
}

/// Line codec with a bounded line length
///
/// # Buffering
/// Bytes after the last delimiter stay in the caller's buffer. `next_index`
/// remembers how far the buffer was already scanned so that a slow trickle of
/// bytes does not rescan the whole partial line on every call.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Maximum accepted line length, excluding the delimiter
    max_length: usize,

    /// Index to resume the delimiter scan from
    next_index: usize,

    /// Bytes dropped so far while skipping an oversized line
    discarding: Option<usize>,
}

impl LineCodec {
    /// Create a codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec that rejects lines longer than `max_length`
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            next_index: 0,
            discarding: None,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = NetSyncError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == DELIMITER);

            match (self.discarding, newline) {
                (Some(discarded), Some(offset)) => {
                    let end = self.next_index + offset + 1;
                    buf.advance(end);
                    self.next_index = 0;
                    self.discarding = None;
                    return Ok(Some(Frame::Oversized {
                        discarded: discarded + end - 1,
                    }));
                }
                (Some(discarded), None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    self.discarding = Some(discarded + read_to);
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (None, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;

                    let mut line = buf.split_to(end + 1);
                    line.truncate(end);
                    if line.last() == Some(&b'\r') {
                        line.truncate(end - 1);
                    }

                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Ok(Some(Frame::Line(line.freeze())));
                }
                (None, None) if buf.len() > self.max_length => {
                    tracing::debug!(
                        "Line exceeds {} bytes without a delimiter, discarding",
                        self.max_length
                    );
                    self.discarding = Some(0);
                }
                (None, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        let pending = self.discarding.take().unwrap_or(0) + buf.len();
        buf.clear();
        self.next_index = 0;

        if pending == 0 {
            Ok(None)
        } else {
            Ok(Some(Frame::Truncated { remaining: pending }))
        }
    }
}

impl Encoder<Command> for LineCodec {
    type Error = NetSyncError;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> Result<()> {
        encode_command_into(&command, dst)
    }
}

impl Encoder<&Command> for LineCodec {
    type Error = NetSyncError;

    fn encode(&mut self, command: &Command, dst: &mut BytesMut) -> Result<()> {
        encode_command_into(command, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsync_core::EntityId;

    fn line(frame: Option<Frame>) -> Vec<u8> {
        match frame {
            Some(Frame::Line(bytes)) => bytes.to_vec(),
            other => panic!("expected a line, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_line_waits_for_delimiter() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"{\"a\":");

        buf.extend_from_slice(b"1}\n");
        assert_eq!(line(codec.decode(&mut buf).unwrap()), b"{\"a\":1}");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_lines_in_one_buffer() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"one\ntwo\r\nthr"[..]);

        assert_eq!(line(codec.decode(&mut buf).unwrap()), b"one");
        assert_eq!(line(codec.decode(&mut buf).unwrap()), b"two");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"thr");
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"\n  \r\n[]\n"[..]);

        assert_eq!(line(codec.decode(&mut buf).unwrap()), b"[]");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_oversized_line_is_discarded() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789abcdef"[..]);

        // No delimiter yet: the codec starts discarding and keeps nothing
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"xyz\nok\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Oversized { discarded: 19 })
        );
        assert_eq!(line(codec.decode(&mut buf).unwrap()), b"ok");
    }

    #[test]
    fn test_line_at_limit_is_accepted() {
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from(&b"abcd\n"[..]);
        assert_eq!(line(codec.decode(&mut buf).unwrap()), b"abcd");
    }

    #[test]
    fn test_eof_reports_truncated_tail() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"done\npart"[..]);

        assert_eq!(line(codec.decode_eof(&mut buf).unwrap()), b"done");
        assert_eq!(
            codec.decode_eof(&mut buf).unwrap(),
            Some(Frame::Truncated { remaining: 4 })
        );
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_encoder_appends_single_delimiter() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(
                Command::Attack {
                    attacker_id: EntityId::new(1),
                    target_id: EntityId::new(2),
                },
                &mut buf,
            )
            .unwrap();

        assert_eq!(buf.iter().filter(|b| **b == DELIMITER).count(), 1);
        assert_eq!(buf.last(), Some(&DELIMITER));
    }
}
