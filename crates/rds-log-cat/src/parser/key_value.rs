// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `key=value` lines, e.g. `level=info duration=12.5 user="my app"`.
//!
//! Pairs are separated by whitespace; a double-quoted value may contain
//! whitespace.

use serde_json::{Number, Value};

use super::{ParsedRecord, Parser};
use crate::error::{LineParseError, ParserError};

pub const FORMAT: &str = "key_value";

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueParser;

impl Parser for KeyValueParser {
    fn parse(&self, line: &str) -> Result<ParsedRecord, ParserError> {
        let mut record = ParsedRecord::new();
        for token in tokens(line) {
            let Some((key, value)) = token.split_once('=') else {
                return Err(LineParseError::new(line, format!("token '{token}' is not key=value")).into());
            };
            if key.is_empty() {
                return Err(LineParseError::new(line, "empty key").into());
            }
            record.insert(key.to_string(), typed_value(value));
        }
        if record.is_empty() {
            return Err(LineParseError::new(line, "no key=value pair").into());
        }
        Ok(record)
    }
}

/// Splits on whitespace outside double quotes.
fn tokens(line: &str) -> impl Iterator<Item = &str> {
    let mut rest = line.trim_start();
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut quoted = false;
        let end = rest
            .char_indices()
            .find(|(_, c)| {
                if *c == '"' {
                    quoted = !quoted;
                }
                c.is_whitespace() && !quoted
            })
            .map_or(rest.len(), |(idx, _)| idx);
        let (token, tail) = rest.split_at(end);
        rest = tail.trim_start();
        Some(token)
    })
}

fn typed_value(raw: &str) -> Value {
    if let Some(unquoted) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Value::String(unquoted.to_string());
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(float) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(float);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
