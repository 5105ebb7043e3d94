// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Builders for events, configuration and forwarders

use std::sync::Arc;

use rds_log_cat::sender::RetryStrategy;
use rds_log_cat::{Config, Forwarder, ParserRegistry, TriggerEvent};
use serde_json::json;

use super::mocks::{MemoryObjectStore, RecordingSink};

pub const BUCKET: &str = "rds-log-bucket";

pub fn config(format: &str) -> Config {
    Config {
        format: format.to_string(),
        stream_name: "rds-logs".to_string(),
        retry_strategy: RetryStrategy::Immediate(2),
        ..Config::default()
    }
}

/// S3 `ObjectCreated` event naming `keys` in [`BUCKET`].
pub fn s3_event(keys: &[&str]) -> TriggerEvent {
    let records: Vec<_> = keys
        .iter()
        .map(|key| {
            json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "awsRegion": "eu-west-1",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "bucket": { "name": BUCKET, "arn": format!("arn:aws:s3:::{BUCKET}") },
                    "object": { "key": key, "size": 42 }
                }
            })
        })
        .collect();
    TriggerEvent::from_value(json!({ "Records": records })).unwrap()
}

pub fn forwarder(
    config: Config,
    store: &Arc<MemoryObjectStore>,
    sink: &Arc<RecordingSink>,
) -> Forwarder {
    Forwarder::new(
        config,
        ParserRegistry::with_defaults(),
        Arc::clone(store) as _,
        Arc::clone(sink) as _,
    )
}
