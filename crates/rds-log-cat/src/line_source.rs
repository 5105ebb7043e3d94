// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Incremental line splitting over an object byte stream.
//!
//! [`LineSource`] pulls bounded chunks from the reader and yields one
//! [`SourceLine`] per `\n`-terminated line, numbered densely from zero.
//! Memory use is bounded by the maximum line length, not by the object
//! size: a line longer than the limit is discarded while it streams past
//! and reported as [`SourceLine::Oversized`] so that later ordinals are
//! unaffected.

use std::cmp;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, BytesMut};
use futures::Stream;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

use crate::constants::MAX_RECORD_SIZE_BYTES;

/// A line of text together with its 0-based position in the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub ordinal: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLine {
    Line(RawLine),
    /// A line longer than the configured limit; its content was dropped.
    Oversized { ordinal: usize, length: usize },
}

#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index in the buffer up to which no newline was found.
    next_index: usize,
    max_length: usize,
    next_ordinal: usize,
    /// Bytes of the current overlong line already thrown away.
    discarding: Option<usize>,
}

impl LineCodec {
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
            next_ordinal: 0,
            discarding: None,
        }
    }

    fn take_ordinal(&mut self) -> usize {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }

    fn line(&mut self, bytes: &[u8]) -> SourceLine {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        if bytes.len() > self.max_length {
            return self.oversized(bytes.len());
        }
        SourceLine::Line(RawLine {
            ordinal: self.take_ordinal(),
            text: String::from_utf8_lossy(bytes).into_owned(),
        })
    }

    fn oversized(&mut self, length: usize) -> SourceLine {
        SourceLine::Oversized {
            ordinal: self.take_ordinal(),
            length,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(MAX_RECORD_SIZE_BYTES)
    }
}

impl Decoder for LineCodec {
    type Item = SourceLine;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<SourceLine>, io::Error> {
        loop {
            // room for the longest line plus a `\r\n` terminator
            let read_to = cmp::min(self.max_length.saturating_add(2), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (Some(discarded), Some(offset)) => {
                    buf.advance(offset + 1);
                    self.discarding = None;
                    self.next_index = 0;
                    return Ok(Some(self.oversized(discarded + offset)));
                }
                (Some(discarded), None) => {
                    buf.advance(read_to);
                    self.discarding = Some(discarded + read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (None, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    return Ok(Some(self.line(&line[..end])));
                }
                (None, None) if buf.len() > self.max_length.saturating_add(1) => {
                    self.discarding = Some(0);
                    self.next_index = 0;
                }
                (None, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<SourceLine>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if let Some(discarded) = self.discarding.take() {
            let length = discarded + buf.len();
            buf.clear();
            return Ok(Some(self.oversized(length)));
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            // blank trailing fragment
            buf.clear();
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        Ok(Some(self.line(&rest)))
    }
}

/// Forward-only sequence of lines read from an owned byte stream.
///
/// The source takes ownership of the reader, so a fully consumed source
/// cannot be replayed.
#[derive(Debug)]
pub struct LineSource<R> {
    inner: FramedRead<R, LineCodec>,
}

impl<R: AsyncRead> LineSource<R> {
    pub fn new(reader: R, max_line_length: usize) -> Self {
        Self {
            inner: FramedRead::new(reader, LineCodec::new(max_line_length)),
        }
    }
}

impl<R: AsyncRead + Unpin> Stream for LineSource<R> {
    type Item = io::Result<SourceLine>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn line(ordinal: usize, text: &str) -> SourceLine {
        SourceLine::Line(RawLine {
            ordinal,
            text: text.to_string(),
        })
    }

    async fn collect(input: &'static [u8], max: usize) -> Vec<SourceLine> {
        LineSource::new(input, max)
            .map(|l| l.expect("in-memory reads do not fail"))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_splits_lines_with_dense_ordinals() {
        let lines = collect(b"a=1\ngarbage\na=2\n", 64).await;
        assert_eq!(lines, vec![line(0, "a=1"), line(1, "garbage"), line(2, "a=2")]);
    }

    #[tokio::test]
    async fn test_no_trailing_empty_line() {
        let lines = collect(b"first\nsecond\n", 64).await;
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_last_line_without_newline() {
        let lines = collect(b"first\nsecond", 64).await;
        assert_eq!(lines, vec![line(0, "first"), line(1, "second")]);
    }

    #[tokio::test]
    async fn test_blank_trailing_fragment_suppressed() {
        let lines = collect(b"first\n \r", 64).await;
        assert_eq!(lines, vec![line(0, "first")]);
    }

    #[tokio::test]
    async fn test_interior_blank_lines_are_kept() {
        let lines = collect(b"a\n\nb\n", 64).await;
        assert_eq!(lines, vec![line(0, "a"), line(1, ""), line(2, "b")]);
    }

    #[tokio::test]
    async fn test_crlf_is_stripped() {
        let lines = collect(b"a=1\r\na=2\r\n", 64).await;
        assert_eq!(lines, vec![line(0, "a=1"), line(1, "a=2")]);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_kept_with_either_terminator() {
        let lines = collect(b"12345678\r\nabcdefgh\n", 8).await;
        assert_eq!(lines, vec![line(0, "12345678"), line(1, "abcdefgh")]);
    }

    #[tokio::test]
    async fn test_line_one_past_limit_is_oversized_with_either_terminator() {
        let lines = collect(b"123456789\r\nabcdefghi\nok\n", 8).await;
        assert!(matches!(lines[0], SourceLine::Oversized { ordinal: 0, .. }));
        assert!(matches!(lines[1], SourceLine::Oversized { ordinal: 1, .. }));
        assert_eq!(lines[2..], [line(2, "ok")]);
    }

    #[tokio::test]
    async fn test_empty_stream_yields_nothing() {
        assert!(collect(b"", 64).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let lines = collect(b"caf\xff\n", 64).await;
        assert_eq!(lines, vec![line(0, "caf\u{fffd}")]);
    }

    #[tokio::test]
    async fn test_oversized_line_keeps_following_ordinals() {
        let lines = collect(b"ok\n0123456789abcdef\nafter\n", 8).await;
        assert_eq!(
            lines,
            vec![
                line(0, "ok"),
                SourceLine::Oversized {
                    ordinal: 1,
                    length: 16
                },
                line(2, "after"),
            ]
        );
    }

    #[tokio::test]
    async fn test_oversized_last_line_without_newline() {
        let lines = collect(b"ok\n0123456789abcdef", 8).await;
        assert_eq!(
            lines,
            vec![
                line(0, "ok"),
                SourceLine::Oversized {
                    ordinal: 1,
                    length: 16
                },
            ]
        );
    }

    #[test]
    fn test_decoder_waits_for_newline_across_chunks() {
        let mut codec = LineCodec::new(64);
        let mut buf = BytesMut::from(&b"par"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"tial\nnext");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(line(0, "partial")));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(line(1, "next")));
    }

    #[test]
    fn test_decoder_discards_across_chunks() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from(&b"abcdefgh"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
        buf.extend_from_slice(b"ij\nk\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(SourceLine::Oversized {
                ordinal: 0,
                length: 10
            })
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(line(1, "k")));
    }
}
