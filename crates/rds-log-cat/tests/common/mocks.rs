// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-ins for the object store and the record sink

use std::collections::HashMap;
use std::sync::Mutex;

use rds_log_cat::handler::{ObjectReader, ObjectStore, StoreError};
use rds_log_cat::processor::OutgoingRecord;
use rds_log_cat::sender::{PutRecordsOutcome, RecordResult, RecordSink, SinkError};

/// Object store backed by a map of `bucket/key` to body.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: HashMap<String, Vec<u8>>,
    opened: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MemoryObjectStore {
    pub fn with_object(mut self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(format!("{bucket}/{key}"), body.into());
        self
    }

    /// `bucket/key` of every open call, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn open(&self, bucket: &str, key: &str) -> Result<ObjectReader, StoreError> {
        let path = format!("{bucket}/{key}");
        self.opened.lock().unwrap().push(path.clone());
        match self.objects.get(&path) {
            Some(body) => Ok(Box::pin(std::io::Cursor::new(body.clone()))),
            None => Err(StoreError(format!("NoSuchKey: {path}"))),
        }
    }
}

/// One `put_records` call as seen by the sink.
#[derive(Debug, Clone)]
pub struct PutCall {
    pub stream_name: String,
    pub records: Vec<OutgoingRecord>,
}

/// Sink that records every call. Rejects every record when built with
/// [`RecordingSink::rejecting`].
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<PutCall>>,
    reject_with: Option<String>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn rejecting(error_code: &str) -> Self {
        Self {
            reject_with: Some(error_code.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<PutCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every record submitted, across all calls.
    pub fn records(&self) -> Vec<OutgoingRecord> {
        self.calls()
            .into_iter()
            .flat_map(|call| call.records)
            .collect()
    }
}

#[async_trait::async_trait]
impl RecordSink for RecordingSink {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[OutgoingRecord],
    ) -> Result<PutRecordsOutcome, SinkError> {
        self.calls.lock().unwrap().push(PutCall {
            stream_name: stream_name.to_string(),
            records: records.to_vec(),
        });
        match &self.reject_with {
            None => Ok(PutRecordsOutcome::all_delivered(records.len())),
            Some(code) => Ok(PutRecordsOutcome {
                results: records
                    .iter()
                    .map(|_| RecordResult::Failed {
                        error_code: code.clone(),
                        error_message: "Rate exceeded for shard".to_string(),
                    })
                    .collect(),
            }),
        }
    }
}
