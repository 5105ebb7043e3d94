// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded batching and delivery of records to the streaming sink.
//!
//! # Architecture
//!
//! ```text
//!   RecordProcessor (pull)
//!         │
//!         v
//!   ┌─────────────┐
//!   │   Batch     │ (≤ max records, ≤ max bytes)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │ put_records │ (one synchronous call per batch)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │   Retry?    │ (only the rejected subset, with backoff)
//!   └─────────────┘
//! ```
//!
//! Batches are delivered in order and each batch keeps the order of its
//! records. Nothing is rolled back: when a later batch fails for good,
//! earlier batches stay delivered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, error, warn};

use crate::constants::{MAX_BATCH_RECORDS, MAX_BATCH_SIZE_BYTES};
use crate::error::{DeliveryError, FailedRecord, PipelineError};
use crate::processor::OutgoingRecord;

/// Error code attached to records of a batch whose call failed as a whole.
pub const TRANSPORT_ERROR_CODE: &str = "TransportError";

/// Per-record result reported by the sink, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordResult {
    Delivered,
    Failed {
        error_code: String,
        error_message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutRecordsOutcome {
    pub results: Vec<RecordResult>,
}

impl PutRecordsOutcome {
    #[must_use]
    pub fn all_delivered(count: usize) -> Self {
        Self {
            results: vec![RecordResult::Delivered; count],
        }
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, RecordResult::Failed { .. }))
            .count()
    }
}

/// The whole call failed (network, throttling of the request, auth...).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SinkError(pub String);

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Submits `records` to `stream_name` in one request.
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[OutgoingRecord],
    ) -> Result<PutRecordsOutcome, SinkError>;
}

/// How often, and how patiently, a batch is resubmitted.
///
/// Attempt counts include the first submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Retry right away.
    Immediate(u64),
    /// Attempts, fixed delay in milliseconds.
    LinearBackoff(u64, u64),
    /// Delay doubles after every attempt, capped at `max_delay_ms`.
    ExponentialBackoff {
        attempts: u64,
        base_delay_ms: u64,
        max_delay_ms: u64,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::ExponentialBackoff {
            attempts: 4,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryStrategy {
    #[must_use]
    pub fn max_attempts(&self) -> u64 {
        let attempts = match self {
            RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
                *attempts
            }
            RetryStrategy::ExponentialBackoff { attempts, .. } => *attempts,
        };
        attempts.max(1)
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u64) -> Duration {
        match self {
            RetryStrategy::Immediate(_) => Duration::ZERO,
            RetryStrategy::LinearBackoff(_, delay_ms) => Duration::from_millis(*delay_ms),
            RetryStrategy::ExponentialBackoff {
                base_delay_ms,
                max_delay_ms,
                ..
            } => {
                let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                let factor = 2_u64.checked_pow(exponent).unwrap_or(u64::MAX);
                Duration::from_millis(base_delay_ms.saturating_mul(factor).min(*max_delay_ms))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub batches: usize,
    pub records: usize,
}

#[derive(Clone)]
pub struct BatchSender {
    sink: Arc<dyn RecordSink>,
    stream_name: String,
    max_batch_records: usize,
    max_batch_bytes: usize,
    retry_strategy: RetryStrategy,
}

impl BatchSender {
    pub fn new(
        sink: Arc<dyn RecordSink>,
        stream_name: impl Into<String>,
        retry_strategy: RetryStrategy,
    ) -> Self {
        BatchSender {
            sink,
            stream_name: stream_name.into(),
            max_batch_records: MAX_BATCH_RECORDS,
            max_batch_bytes: MAX_BATCH_SIZE_BYTES,
            retry_strategy,
        }
    }

    /// Overrides the batch bounds; zero values are raised to one.
    #[must_use]
    pub fn with_limits(mut self, max_batch_records: usize, max_batch_bytes: usize) -> Self {
        self.max_batch_records = max_batch_records.max(1);
        self.max_batch_bytes = max_batch_bytes.max(1);
        self
    }

    /// Drains `records`, delivering them batch by batch.
    ///
    /// An error item from `records` is returned as is; the records gathered
    /// for the current batch are then not sent.
    pub async fn send_all<S>(&self, records: &mut S) -> Result<SendSummary, PipelineError>
    where
        S: Stream<Item = Result<OutgoingRecord, PipelineError>> + Unpin,
    {
        let mut summary = SendSummary::default();
        let mut batch: Vec<OutgoingRecord> = Vec::new();
        let mut batch_bytes = 0;

        while let Some(record) = records.next().await {
            let record = record?;
            if !batch.is_empty() && batch_bytes + record.size() > self.max_batch_bytes {
                self.deliver(std::mem::take(&mut batch), &mut summary).await?;
                batch_bytes = 0;
            }
            batch_bytes += record.size();
            batch.push(record);
            if batch.len() >= self.max_batch_records {
                self.deliver(std::mem::take(&mut batch), &mut summary).await?;
                batch_bytes = 0;
            }
        }

        if !batch.is_empty() {
            self.deliver(batch, &mut summary).await?;
        }
        debug!(
            "SENDER | Sent {} records in {} batches to {}",
            summary.records, summary.batches, self.stream_name
        );
        Ok(summary)
    }

    async fn deliver(
        &self,
        batch: Vec<OutgoingRecord>,
        summary: &mut SendSummary,
    ) -> Result<(), DeliveryError> {
        let size = batch.len();
        self.send_batch(batch).await?;
        summary.batches += 1;
        summary.records += size;
        Ok(())
    }

    /// Sends one batch, resubmitting only the rejected records until the
    /// retry strategy is exhausted.
    pub async fn send_batch(&self, batch: Vec<OutgoingRecord>) -> Result<(), DeliveryError> {
        let total = batch.len();
        let max_attempts = self.retry_strategy.max_attempts();
        let mut pending = batch;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failures = self.submit(pending).await;

            if failures.is_empty() {
                debug!("SENDER | Delivered batch of {total} records (attempt {attempt})");
                return Ok(());
            }

            if attempt >= max_attempts {
                error!(
                    "SENDER | {} of {} records still rejected after {} attempts",
                    failures.len(),
                    total,
                    attempt
                );
                return Err(DeliveryError {
                    stream: self.stream_name.clone(),
                    attempts: attempt,
                    failed: failures.into_iter().map(|(_, failed)| failed).collect(),
                });
            }

            warn!(
                "SENDER | {} of {} records rejected (attempt {}/{}), retrying the failed subset",
                failures.len(),
                total,
                attempt,
                max_attempts
            );
            pending = failures.into_iter().map(|(record, _)| record).collect();
            tokio::time::sleep(self.retry_strategy.delay(attempt)).await;
        }
    }

    /// One `put_records` call; returns the records that were not delivered.
    async fn submit(&self, pending: Vec<OutgoingRecord>) -> Vec<(OutgoingRecord, FailedRecord)> {
        let outcome = match self.sink.put_records(&self.stream_name, &pending).await {
            Ok(outcome) if outcome.results.len() == pending.len() => outcome,
            Ok(outcome) => {
                let reason = format!(
                    "sink reported {} results for {} records",
                    outcome.results.len(),
                    pending.len()
                );
                return fail_all(pending, &reason);
            }
            Err(e) => {
                warn!("SENDER | put_records call failed: {e}");
                return fail_all(pending, &e.to_string());
            }
        };

        pending
            .into_iter()
            .zip(outcome.results)
            .filter_map(|(record, result)| match result {
                RecordResult::Delivered => None,
                RecordResult::Failed {
                    error_code,
                    error_message,
                } => {
                    let failed = FailedRecord {
                        partition_key: record.partition_key.clone(),
                        error_code,
                        error_message,
                    };
                    Some((record, failed))
                }
            })
            .collect()
    }
}

fn fail_all(records: Vec<OutgoingRecord>, reason: &str) -> Vec<(OutgoingRecord, FailedRecord)> {
    records
        .into_iter()
        .map(|record| {
            let failed = FailedRecord {
                partition_key: record.partition_key.clone(),
                error_code: TRANSPORT_ERROR_CODE.to_string(),
                error_message: reason.to_string(),
            };
            (record, failed)
        })
        .collect()
}
