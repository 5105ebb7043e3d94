// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by every stage of the forwarding pipeline.
//!
//! Only [`LineParseError`] is recovered locally (the offending line is
//! skipped and counted). Every [`PipelineError`] aborts the object being
//! processed and, through the event adapter, the rest of the invocation.

use std::fmt;

/// A single line could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparsable line: {reason}")]
pub struct LineParseError {
    pub line: String,
    pub reason: String,
}

impl LineParseError {
    pub fn new(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of a failed `Parser::parse` call.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    /// The line does not match the format; the line is skipped.
    #[error(transparent)]
    Line(#[from] LineParseError),

    /// The parser itself is broken; processing of the object stops.
    #[error("parser failure: {0}")]
    Internal(String),
}

/// A record the sink still rejected once retries were exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub partition_key: String,
    pub error_code: String,
    pub error_message: String,
}

impl fmt::Display for FailedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}: {})",
            self.partition_key, self.error_code, self.error_message
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error(
    "{} record(s) not delivered to stream {stream} after {attempts} attempts: {}",
    .failed.len(),
    .failed.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
)]
pub struct DeliveryError {
    pub stream: String,
    pub attempts: u64,
    pub failed: Vec<FailedRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Unknown log format '{format}'")]
    UnknownFormat { format: String },

    #[error("Failed to open s3://{bucket}/{key}: {reason}")]
    StreamOpen {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Failed to read from object stream: {0}")]
    Read(#[from] std::io::Error),

    #[error("Parser failed on line {ordinal}: {reason}")]
    Parser { ordinal: usize, reason: String },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Invalid trigger event: {0}")]
    InvalidEvent(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_display() {
        let error = PipelineError::UnknownFormat {
            format: "syslog".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown log format 'syslog'");
    }

    #[test]
    fn test_line_parse_error_converts_into_parser_error() {
        let error: ParserError = LineParseError::new("garbage", "no key=value pair").into();
        assert!(matches!(error, ParserError::Line(ref lpe) if lpe.line == "garbage"));
        assert_eq!(error.to_string(), "unparsable line: no key=value pair");
    }

    #[test]
    fn test_delivery_error_names_failed_records() {
        let error = DeliveryError {
            stream: "logs".to_string(),
            attempts: 3,
            failed: vec![FailedRecord {
                partition_key: "abc".to_string(),
                error_code: "ProvisionedThroughputExceededException".to_string(),
                error_message: "Rate exceeded".to_string(),
            }],
        };
        let message = PipelineError::from(error).to_string();
        assert!(message.starts_with("1 record(s) not delivered to stream logs after 3 attempts"));
        assert!(message.contains("abc (ProvisionedThroughputExceededException: Rate exceeded)"));
    }
}
