// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! RDS for MySQL error log lines, both the 5.7 form
//! (`<ts> <thread> [<level>] <message>`) and the 8.0 form which adds an
//! error code and subsystem.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{ParsedRecord, Parser};
use crate::error::{LineParseError, ParserError};

pub const FORMAT: &str = "mysql_error";

#[allow(clippy::expect_used)]
static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<timestamp>\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?)\s+(?P<thread>\d+)\s+\[(?P<level>[A-Za-z]+)\]\s*(?:\[(?P<error_code>MY-\d+)\]\s*)?(?:\[(?P<subsystem>[A-Za-z]+)\]\s*)?(?P<message>.*)$",
    )
    .expect("mysql error line pattern is valid")
});

const TEXT_FIELDS: [&str; 5] = ["timestamp", "level", "error_code", "subsystem", "message"];

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlErrorParser;

impl Parser for MysqlErrorParser {
    fn parse(&self, line: &str) -> Result<ParsedRecord, ParserError> {
        let caps = LINE
            .captures(line)
            .ok_or_else(|| LineParseError::new(line, "does not match the MySQL error log layout"))?;

        let mut record = ParsedRecord::new();
        for field in TEXT_FIELDS {
            if let Some(m) = caps.name(field) {
                record.insert(field.to_string(), Value::String(m.as_str().to_string()));
            }
        }
        let thread = caps["thread"]
            .parse::<u64>()
            .map_err(|e| LineParseError::new(line, format!("invalid thread id: {e}")))?;
        record.insert("thread".to_string(), Value::Number(thread.into()));
        Ok(record)
    }
}
