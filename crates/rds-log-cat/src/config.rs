// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_ORIGIN, MAX_BATCH_RECORDS, MAX_BATCH_SIZE_BYTES, MAX_RECORD_SIZE_BYTES,
};
use crate::error::ConfigError;
use crate::sender::RetryStrategy;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration of one forwarder deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Parser format identifier (e.g. `postgresql`)
    pub format: String,
    /// Destination stream name
    pub stream_name: String,
    /// Tag merged into every record as `origin`
    pub origin: String,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    pub max_batch_records: usize,
    pub max_batch_bytes: usize,
    /// Longer lines are skipped
    pub max_line_bytes: usize,
    pub retry_strategy: RetryStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: String::new(),
            stream_name: String::new(),
            origin: DEFAULT_ORIGIN.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            max_batch_records: MAX_BATCH_RECORDS,
            max_batch_bytes: MAX_BATCH_SIZE_BYTES,
            max_line_bytes: MAX_RECORD_SIZE_BYTES,
            retry_strategy: RetryStrategy::default(),
        }
    }
}

/// Document form of the configuration: `{"type", "kinesisStream", "origin"}`.
#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(rename = "type")]
    format: String,
    #[serde(rename = "kinesisStream")]
    stream_name: String,
    origin: Option<String>,
    #[serde(rename = "logLevel")]
    log_level: Option<String>,
    #[serde(rename = "maxBatchRecords")]
    max_batch_records: Option<usize>,
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let format = lookup("RDS_LOG_CAT_TYPE").ok_or(ConfigError::Missing("RDS_LOG_CAT_TYPE"))?;
        let stream_name = lookup("RDS_LOG_CAT_KINESIS_STREAM")
            .ok_or(ConfigError::Missing("RDS_LOG_CAT_KINESIS_STREAM"))?;
        let origin = lookup("RDS_LOG_CAT_ORIGIN").unwrap_or(defaults.origin);
        let log_level = lookup("LOG_LEVEL")
            .map(|val| normalize_log_level(&val))
            .unwrap_or(defaults.log_level);
        let max_batch_records = parse_var(&lookup, "RDS_LOG_CAT_MAX_BATCH_RECORDS")?
            .unwrap_or(defaults.max_batch_records);

        let retry_strategy = match (
            parse_var::<u64, _>(&lookup, "RDS_LOG_CAT_RETRY_ATTEMPTS")?,
            parse_var::<u64, _>(&lookup, "RDS_LOG_CAT_RETRY_BACKOFF_MS")?,
        ) {
            (None, None) => defaults.retry_strategy,
            (attempts, base_delay_ms) => RetryStrategy::ExponentialBackoff {
                attempts: attempts.unwrap_or(4),
                base_delay_ms: base_delay_ms.unwrap_or(100),
                max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            },
        };

        let config = Self {
            format,
            stream_name,
            origin,
            log_level,
            max_batch_records,
            max_batch_bytes: defaults.max_batch_bytes,
            max_line_bytes: defaults.max_line_bytes,
            retry_strategy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration document; `origin` defaults to `rds`.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let doc: ConfigDocument = serde_json::from_str(document)
            .map_err(|e| ConfigError::Invalid(format!("malformed configuration document: {e}")))?;
        let defaults = Config::default();
        let config = Self {
            format: doc.format,
            stream_name: doc.stream_name,
            origin: doc.origin.unwrap_or(defaults.origin),
            log_level: doc
                .log_level
                .map(|val| normalize_log_level(&val))
                .unwrap_or(defaults.log_level),
            max_batch_records: doc.max_batch_records.unwrap_or(defaults.max_batch_records),
            ..Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.format.trim().is_empty() {
            return Err(ConfigError::Invalid("log format cannot be empty".to_string()));
        }
        if self.stream_name.trim().is_empty() {
            return Err(ConfigError::Invalid("stream name cannot be empty".to_string()));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }
        if self.max_batch_records == 0 || self.max_batch_records > MAX_BATCH_RECORDS {
            return Err(ConfigError::Invalid(format!(
                "max batch records must be between 1 and {MAX_BATCH_RECORDS}, got {}",
                self.max_batch_records
            )));
        }
        if self.max_batch_bytes == 0 || self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid(
                "byte limits must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lowercases the level and maps `warning`/`critical`/`fatal` onto the
/// closest tracing level.
fn normalize_log_level(raw: &str) -> String {
    let level = raw.trim().to_lowercase();
    match level.as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        _ => level,
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::Invalid(format!("{name}='{raw}': {e}")))
        })
        .transpose()
}
