// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! RDS for PostgreSQL logs written with the default `log_line_prefix`
//! (`%t:%r:%u@%d:[%p]:`), for example:
//!
//! ```text
//! 2024-03-01 12:00:00 UTC:10.0.0.1(51234):app@orders:[4242]:LOG:  connection authorized
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{ParsedRecord, Parser};
use crate::error::{LineParseError, ParserError};

pub const FORMAT: &str = "postgresql";

#[allow(clippy::expect_used)]
static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)? [A-Z]+):(?P<client>[^:]*):(?P<user>[^@:]*)@(?P<database>[^:]*):\[(?P<pid>\d+)\]:(?P<level>[A-Z]+[0-9]?):\s*(?P<message>.*)$",
    )
    .expect("postgresql line pattern is valid")
});

const TEXT_FIELDS: [&str; 6] = ["timestamp", "client", "user", "database", "level", "message"];

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresqlParser;

impl Parser for PostgresqlParser {
    fn parse(&self, line: &str) -> Result<ParsedRecord, ParserError> {
        let caps = LINE
            .captures(line)
            .ok_or_else(|| LineParseError::new(line, "does not match the PostgreSQL log prefix"))?;

        let mut record = ParsedRecord::new();
        for field in TEXT_FIELDS {
            if let Some(m) = caps.name(field) {
                record.insert(field.to_string(), Value::String(m.as_str().to_string()));
            }
        }
        let pid = caps["pid"]
            .parse::<u64>()
            .map_err(|e| LineParseError::new(line, format!("invalid pid: {e}")))?;
        record.insert("pid".to_string(), Value::Number(pid.into()));
        Ok(record)
    }
}
