// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line parsing, tagging and partition key derivation.
//!
//! The [`RecordProcessor`] is a lazy stream adapter: every record pulled
//! from it pulls just enough lines from the underlying [`LineSource`] to
//! produce one record, so a slow sink stalls the object read.
//!
//! ```text
//!   SourceLine ──> Parser ──ok──> + origin ──> JSON ──> OutgoingRecord
//!                    │
//!                    └──line error──> skipped += 1 (debug diagnostic)
//! ```
//!
//! Ordinals come from the line source, so a skipped line never shifts the
//! partition keys of the lines after it.
//!
//! [`LineSource`]: crate::line_source::LineSource

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::Stream;
use serde_json::Value;
use sha2::{Digest, Sha224};
use tracing::{debug, info};

use crate::constants::{DIAGNOSTIC_LINE_CHARS, MAX_RECORD_SIZE_BYTES};
use crate::error::{ParserError, PipelineError};
use crate::line_source::{RawLine, SourceLine};
use crate::parser::Parser;

/// Field merged into every parsed record.
pub const ORIGIN_FIELD: &str = "origin";

/// The unit handed to the streaming sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRecord {
    /// Serialized JSON record.
    pub data: Vec<u8>,
    pub partition_key: String,
}

impl OutgoingRecord {
    /// Bytes this record contributes to a `PutRecords` request.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len() + self.partition_key.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub read: usize,
    pub skipped: usize,
}

/// Hex encoded SHA-224 of `"{object_id}.{ordinal}"`.
///
/// Depends only on the object and the line position, so reprocessing an
/// object yields the same key sequence.
#[must_use]
pub fn partition_key(object_id: &str, ordinal: usize) -> String {
    let mut hasher = Sha224::new();
    hasher.update(format!("{object_id}.{ordinal}").as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Finished,
    Failed,
}

pub struct RecordProcessor<S> {
    lines: S,
    parser: Arc<dyn Parser>,
    object_id: String,
    origin: String,
    counters: Counters,
    state: State,
}

impl<S> RecordProcessor<S>
where
    S: Stream<Item = io::Result<SourceLine>> + Unpin,
{
    pub fn new(
        lines: S,
        parser: Arc<dyn Parser>,
        object_id: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            lines,
            parser,
            object_id: object_id.into(),
            origin: origin.into(),
            counters: Counters::default(),
            state: State::Running,
        }
    }

    /// Counts so far; final once [`is_finished`](Self::is_finished) is true.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// True once the line source was drained and the summary emitted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    fn process_line(&mut self, line: SourceLine) -> Result<Option<OutgoingRecord>, PipelineError> {
        let RawLine { ordinal, text } = match line {
            SourceLine::Line(raw) => raw,
            SourceLine::Oversized { ordinal, length } => {
                self.skip(ordinal, &format!("line of {length} bytes exceeds the size limit"), None);
                return Ok(None);
            }
        };

        match self.parser.parse(&text) {
            Ok(mut record) => {
                record.insert(ORIGIN_FIELD.to_string(), Value::String(self.origin.clone()));
                let outgoing = OutgoingRecord {
                    data: serde_json::to_vec(&record)?,
                    partition_key: partition_key(&self.object_id, ordinal),
                };
                if outgoing.size() > MAX_RECORD_SIZE_BYTES {
                    self.skip(ordinal, "record exceeds sink size limit", Some(&text));
                    return Ok(None);
                }
                self.counters.read += 1;
                Ok(Some(outgoing))
            }
            Err(ParserError::Line(lpe)) => {
                self.skip(ordinal, &lpe.reason, Some(&text));
                Ok(None)
            }
            Err(ParserError::Internal(reason)) => Err(PipelineError::Parser { ordinal, reason }),
        }
    }

    fn skip(&mut self, ordinal: usize, reason: &str, text: Option<&str>) {
        self.counters.skipped += 1;
        debug!(
            "skipped unparsable line ({}) because: {}",
            ordinal + 1,
            reason
        );
        if let Some(text) = text {
            debug!(
                "unparsed line ({}): {}",
                ordinal + 1,
                truncate(text, DIAGNOSTIC_LINE_CHARS)
            );
        }
    }

    fn finish(&mut self) {
        self.state = State::Finished;
        let Counters { read, skipped } = self.counters;
        info!(read, skipped, "COUNTERS|read|{}|skipped|{}", read, skipped);
    }
}

impl<S> Stream for RecordProcessor<S>
where
    S: Stream<Item = io::Result<SourceLine>> + Unpin,
{
    type Item = Result<OutgoingRecord, PipelineError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.state != State::Running {
            return Poll::Ready(None);
        }

        loop {
            let result = match ready!(Pin::new(&mut this.lines).poll_next(cx)) {
                None => {
                    this.finish();
                    return Poll::Ready(None);
                }
                Some(Err(e)) => Err(PipelineError::Read(e)),
                Some(Ok(line)) => this.process_line(line),
            };

            match result {
                Ok(Some(record)) => return Poll::Ready(Some(Ok(record))),
                Ok(None) => continue,
                Err(e) => {
                    this.state = State::Failed;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
