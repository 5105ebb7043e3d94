// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Drives one line source, record processor and batch sender per object
//! named in a trigger event.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tracing::{debug, info, info_span, Instrument};

use crate::config::Config;
use crate::error::PipelineError;
use crate::event::{ObjectLocation, TriggerEvent};
use crate::line_source::LineSource;
use crate::parser::{Parser, ParserRegistry};
use crate::processor::{Counters, RecordProcessor};
use crate::sender::{BatchSender, RecordSink};

/// Byte stream of one stored object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Source of log objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn open(&self, bucket: &str, key: &str) -> Result<ObjectReader, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub bucket: String,
    pub key: String,
    pub counters: Counters,
    pub batches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationSummary {
    pub objects: Vec<ObjectSummary>,
}

impl InvocationSummary {
    #[must_use]
    pub fn read(&self) -> usize {
        self.objects.iter().map(|o| o.counters.read).sum()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.objects.iter().map(|o| o.counters.skipped).sum()
    }
}

pub struct Forwarder {
    config: Config,
    registry: ParserRegistry,
    store: Arc<dyn ObjectStore>,
    sender: BatchSender,
}

impl Forwarder {
    pub fn new(
        config: Config,
        registry: ParserRegistry,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        let sender = BatchSender::new(
            sink,
            config.stream_name.clone(),
            config.retry_strategy.clone(),
        )
        .with_limits(config.max_batch_records, config.max_batch_bytes);
        Self {
            config,
            registry,
            store,
            sender,
        }
    }

    /// Processes every object of `event` in order.
    ///
    /// The first failing object aborts the invocation; objects before it
    /// have already been delivered.
    pub async fn handle(&self, event: &TriggerEvent) -> Result<InvocationSummary, PipelineError> {
        let parser = self.registry.get(&self.config.format)?;
        let mut summary = InvocationSummary::default();

        for location in event.objects() {
            let location = location?;
            let span = info_span!("object", bucket = %location.bucket, key = %location.key);
            let object = self
                .read_and_send(Arc::clone(&parser), &location)
                .instrument(span)
                .await?;
            summary.objects.push(object);
        }

        debug!(
            "Processed {} objects, read {} skipped {}",
            summary.objects.len(),
            summary.read(),
            summary.skipped()
        );
        Ok(summary)
    }

    /// Streams a single object through the pipeline.
    pub async fn read_and_send(
        &self,
        parser: Arc<dyn Parser>,
        location: &ObjectLocation,
    ) -> Result<ObjectSummary, PipelineError> {
        info!("Reading {location}");
        let reader = self
            .store
            .open(&location.bucket, &location.key)
            .await
            .map_err(|e| PipelineError::StreamOpen {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                reason: e.to_string(),
            })?;

        let lines = LineSource::new(reader, self.config.max_line_bytes);
        let mut records = RecordProcessor::new(
            lines,
            parser,
            location.key.clone(),
            self.config.origin.clone(),
        );
        let sent = self.sender.send_all(&mut records).await?;

        Ok(ObjectSummary {
            bucket: location.bucket.clone(),
            key: location.key.clone(),
            counters: records.counters(),
            batches: sent.batches,
        })
    }
}
