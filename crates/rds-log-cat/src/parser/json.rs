// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

use super::{ParsedRecord, Parser};
use crate::error::{LineParseError, ParserError};

pub const FORMAT: &str = "json";

/// One JSON object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, line: &str) -> Result<ParsedRecord, ParserError> {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => Ok(record),
            Ok(other) => Err(LineParseError::new(
                line,
                format!("expected a JSON object, got {}", kind(&other)),
            )
            .into()),
            Err(e) => Err(LineParseError::new(line, e.to_string()).into()),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
