// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log formatting and subscriber setup for the forwarder.
//!
//! Every line is prefixed with `RDS_LOG_CAT` so forwarder output can be
//! told apart from runtime output in CloudWatch Logs:
//!
//! ```text
//! RDS_LOG_CAT | INFO | object{bucket=logs key=error/postgresql.log}: COUNTERS|read|2|skipped|1 read=2 skipped=1
//! ```
//!
//! [`init`] is called once by the entry point. Library code only emits
//! events and never touches the global subscriber.

use std::fmt;

use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Third-party targets kept quiet regardless of the configured level.
const QUIET_TARGETS: &str =
    "aws_config=warn,aws_smithy_runtime=warn,aws_smithy_runtime_api=warn,hyper=off,h2=off,rustls=off";

/// Formatter producing `RDS_LOG_CAT | LEVEL | [spans:] message fields`.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "RDS_LOG_CAT | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter directive for `log_level` with noisy dependencies silenced.
#[must_use]
pub fn filter_directive(log_level: &str) -> String {
    format!("{QUIET_TARGETS},{}", log_level.to_lowercase())
}

/// Installs the global subscriber.
pub fn init(log_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(filter_directive(log_level))?;
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .event_format(Formatter)
        .with_writer(std::io::stdout)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
