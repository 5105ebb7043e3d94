// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits of the Kinesis `PutRecords` API.
//!
//! These bound the batches built by the sender and the lines accepted by
//! the line source:
//! - **Request count**: at most 500 records per `PutRecords` call
//! - **Request size**: at most 5 MiB per call, partition keys included
//! - **Record size**: at most 1 MiB of data per record

/// Maximum number of records per `PutRecords` request.
pub const MAX_BATCH_RECORDS: usize = 500;

/// Maximum size in bytes of a whole `PutRecords` request.
pub const MAX_BATCH_SIZE_BYTES: usize = 5 * 1_024 * 1_024;

/// Maximum size in bytes of a single record's data blob.
///
/// Also the default for the longest line the line source keeps.
pub const MAX_RECORD_SIZE_BYTES: usize = 1_024 * 1_024;

/// Default origin tag merged into every record.
pub const DEFAULT_ORIGIN: &str = "rds";

/// Raw line content included in skip diagnostics is cut to this many chars.
pub(crate) const DIAGNOSTIC_LINE_CHARS: usize = 256;
