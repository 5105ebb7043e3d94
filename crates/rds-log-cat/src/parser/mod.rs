// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pluggable per-format line parsers.
//!
//! A [`Parser`] turns one text line into a flat mapping of field names to
//! JSON values. Parsers hold no state between lines. The [`ParserRegistry`]
//! maps the configured format identifier to a parser, resolved once per
//! invocation before any object is opened.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{ParserError, PipelineError};

pub mod json;
pub mod key_value;
pub mod mysql_error;
pub mod postgresql;

/// Fields extracted from a single line.
pub type ParsedRecord = Map<String, Value>;

pub trait Parser: Send + Sync + Debug {
    /// Parses a single line.
    ///
    /// Returns `ParserError::Line` when the line does not match the format,
    /// which the record processor recovers from by skipping the line. Any
    /// other error aborts the object.
    fn parse(&self, line: &str) -> Result<ParsedRecord, ParserError>;
}

#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn Parser>>,
}

impl ParserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in format.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(key_value::FORMAT, Arc::new(key_value::KeyValueParser));
        registry.register(json::FORMAT, Arc::new(json::JsonParser));
        registry.register(postgresql::FORMAT, Arc::new(postgresql::PostgresqlParser));
        registry.register(mysql_error::FORMAT, Arc::new(mysql_error::MysqlErrorParser));
        registry
    }

    /// Registers `parser` under `format`, replacing any previous entry.
    pub fn register(&mut self, format: impl Into<String>, parser: Arc<dyn Parser>) {
        self.parsers.insert(format.into(), parser);
    }

    pub fn get(&self, format: &str) -> Result<Arc<dyn Parser>, PipelineError> {
        self.parsers
            .get(format)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownFormat {
                format: format.to_string(),
            })
    }

    /// Registered format identifiers, sorted.
    #[must_use]
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LineParseError;

    #[derive(Debug)]
    struct AlwaysFails;

    impl Parser for AlwaysFails {
        fn parse(&self, line: &str) -> Result<ParsedRecord, ParserError> {
            Err(LineParseError::new(line, "never matches").into())
        }
    }

    #[test]
    fn test_defaults_cover_builtin_formats() {
        let registry = ParserRegistry::with_defaults();
        assert_eq!(
            registry.formats(),
            vec!["json", "key_value", "mysql_error", "postgresql"]
        );
    }

    #[test]
    fn test_get_unknown_format() {
        let registry = ParserRegistry::with_defaults();
        let err = registry.get("apache").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownFormat { ref format } if format == "apache"));
    }

    #[test]
    fn test_register_custom_parser() {
        let mut registry = ParserRegistry::new();
        registry.register("broken", Arc::new(AlwaysFails));
        let parser = registry.get("broken").expect("parser registered");
        assert!(matches!(parser.parse("x"), Err(ParserError::Line(_))));
    }
}
