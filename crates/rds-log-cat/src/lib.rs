// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # RDS Log Cat
//!
//! Forwards database log files written to S3 into a Kinesis stream, one
//! JSON record per parsable line.
//!
//! ## Pipeline
//!
//! For every object named in a trigger event:
//! - [`line_source`]: lazy, bounded line splitting over the object body
//! - [`processor`]: parses lines, tags them with `origin`, derives partition keys
//! - [`sender`]: groups records into bounded batches and delivers them with retries
//!
//! [`handler::Forwarder`] wires these together; [`parser::ParserRegistry`]
//! selects the parser for the configured format.

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Runtime configuration from the environment or a JSON document
pub mod config;

pub mod constants;

/// Error types shared across the pipeline
pub mod error;

/// S3 trigger event model
pub mod event;

/// Per-invocation orchestration
pub mod handler;

pub mod line_source;

/// Logging infrastructure and tracing setup
pub mod logger;

pub mod parser;

pub mod processor;

pub mod sender;

pub use config::Config;
pub use error::PipelineError;
pub use event::TriggerEvent;
pub use handler::{Forwarder, InvocationSummary, ObjectReader, ObjectStore, StoreError};
pub use parser::ParserRegistry;
pub use sender::{PutRecordsOutcome, RecordResult, RecordSink, SinkError};
