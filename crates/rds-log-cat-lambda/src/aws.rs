// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! S3 and Kinesis implementations of the forwarder's store and sink.

use async_trait::async_trait;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::{PutRecordsRequestEntry, PutRecordsResultEntry};
use tracing::debug;

use rds_log_cat::handler::{ObjectReader, ObjectStore, StoreError};
use rds_log_cat::processor::OutgoingRecord;
use rds_log_cat::sender::{PutRecordsOutcome, RecordResult, RecordSink, SinkError};

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn open(&self, bucket: &str, key: &str) -> Result<ObjectReader, StoreError> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;
        debug!(
            "Opened s3://{bucket}/{key} ({} bytes)",
            object.content_length().unwrap_or_default()
        );
        Ok(Box::pin(object.body.into_async_read()))
    }
}

pub struct KinesisSink {
    client: aws_sdk_kinesis::Client,
}

impl KinesisSink {
    pub fn new(client: aws_sdk_kinesis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordSink for KinesisSink {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[OutgoingRecord],
    ) -> Result<PutRecordsOutcome, SinkError> {
        let entries = request_entries(records)?;
        let output = self
            .client
            .put_records()
            .stream_name(stream_name)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(|e| SinkError(aws_sdk_kinesis::error::DisplayErrorContext(&e).to_string()))?;
        Ok(outcome(output.records()))
    }
}

fn request_entries(records: &[OutgoingRecord]) -> Result<Vec<PutRecordsRequestEntry>, SinkError> {
    records
        .iter()
        .map(|record| {
            PutRecordsRequestEntry::builder()
                .data(Blob::new(record.data.clone()))
                .partition_key(&record.partition_key)
                .build()
                .map_err(|e| SinkError(e.to_string()))
        })
        .collect()
}

/// Entries carrying an `ErrorCode` were not written.
fn outcome(entries: &[PutRecordsResultEntry]) -> PutRecordsOutcome {
    PutRecordsOutcome {
        results: entries
            .iter()
            .map(|entry| match entry.error_code() {
                None => RecordResult::Delivered,
                Some(code) => RecordResult::Failed {
                    error_code: code.to_string(),
                    error_message: entry.error_message().unwrap_or_default().to_string(),
                },
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_maps_error_codes() {
        let entries = vec![
            PutRecordsResultEntry::builder()
                .sequence_number("49590338271490256608559692538361571095921575989136588898")
                .shard_id("shardId-000000000000")
                .build(),
            PutRecordsResultEntry::builder()
                .error_code("ProvisionedThroughputExceededException")
                .error_message("Rate exceeded for shard shardId-000000000001")
                .build(),
        ];

        let outcome = outcome(&entries);

        assert_eq!(outcome.failed_count(), 1);
        assert_eq!(outcome.results[0], RecordResult::Delivered);
        assert_eq!(
            outcome.results[1],
            RecordResult::Failed {
                error_code: "ProvisionedThroughputExceededException".to_string(),
                error_message: "Rate exceeded for shard shardId-000000000001".to_string(),
            }
        );
    }

    #[test]
    fn test_request_entries_keep_order_and_keys() {
        let records = vec![
            OutgoingRecord {
                data: br#"{"a":1}"#.to_vec(),
                partition_key: "k0".to_string(),
            },
            OutgoingRecord {
                data: br#"{"a":2}"#.to_vec(),
                partition_key: "k2".to_string(),
            },
        ];

        let entries = request_entries(&records).unwrap();

        let keys: Vec<&str> = entries.iter().map(|e| e.partition_key().unwrap()).collect();
        assert_eq!(keys, vec!["k0", "k2"]);
        assert_eq!(entries[1].data().as_ref(), br#"{"a":2}"#);
    }
}
