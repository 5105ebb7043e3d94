// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod aws;

use std::sync::Arc;

use anyhow::Context;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use rds_log_cat::{logger, Config, Forwarder, ParserRegistry, TriggerEvent};

use crate::aws::{KinesisSink, S3ObjectStore};

#[tokio::main]
pub async fn main() -> Result<(), Error> {
    let config = Config::from_env().context("Unable to load forwarder configuration")?;
    logger::init(&config.log_level)?;

    let registry = ParserRegistry::with_defaults();
    if let Err(e) = registry.get(&config.format) {
        error!("{e}, known formats: {}", registry.formats().join(", "));
    }

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3ObjectStore::new(aws_sdk_s3::Client::new(&sdk_config));
    let sink = KinesisSink::new(aws_sdk_kinesis::Client::new(&sdk_config));

    info!(
        "Forwarding {} logs to stream {} with origin {}",
        config.format, config.stream_name, config.origin
    );
    let forwarder = Arc::new(Forwarder::new(
        config,
        registry,
        Arc::new(store),
        Arc::new(sink),
    ));

    run(service_fn(move |event: LambdaEvent<Value>| {
        let forwarder = Arc::clone(&forwarder);
        async move { handle(&forwarder, event).await }
    }))
    .await
}

async fn handle(forwarder: &Forwarder, event: LambdaEvent<Value>) -> Result<Value, Error> {
    debug!("Received event: {}", event.payload);
    let trigger = TriggerEvent::from_value(event.payload)?;

    let summary = forwarder.handle(&trigger).await.map_err(|e| {
        error!("Invocation {} failed: {e}", event.context.request_id);
        e
    })?;

    Ok(json!({
        "objects": summary.objects.len(),
        "read": summary.read(),
        "skipped": summary.skipped(),
    }))
}
