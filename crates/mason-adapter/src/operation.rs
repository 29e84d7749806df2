//! Embedded runtime-operation markers inside compiled SQL.
//!
//! A marker is a line of the form `-- DBT_OPERATION {function: ..., args:
//! {...}}` interleaved with ordinary statements. Splitting preserves textual
//! order; decoding is closed over the [`Operation`] variants, so an unknown
//! function name is a fatal decode error rather than a runtime lookup miss.

use crate::error::{AdapterError, AdapterResult};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// A decoded runtime operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "function", content = "args", rename_all = "snake_case")]
pub enum Operation {
    /// Schema-drift reconciliation: widen target columns to match the
    /// freshly built temp table where the temp column is wider.
    ExpandColumnTypesIfNeeded {
        temp_table: String,
        to_schema: String,
        to_table: String,
    },
}

/// One piece of a compiled SQL body, in textual order.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Plain SQL to execute as-is
    Statement(String),
    /// A decoded operation to dispatch
    Operation(Operation),
}

fn marker_regex() -> &'static Regex {
    static MARKER_RE: OnceLock<Regex> = OnceLock::new();
    MARKER_RE.get_or_init(|| {
        Regex::new(r"-- DBT_OPERATION (\{.*\})").unwrap_or_else(|e| {
            unreachable!("operation marker regex is valid: {e}")
        })
    })
}

/// Split compiled SQL into statements and decoded operations.
///
/// Whitespace-only fragments between markers are dropped; they are split
/// artifacts, not statements.
pub fn split_wrapped_sql(wrapped_sql: &str) -> AdapterResult<Vec<Segment>> {
    let re = marker_regex();
    let mut segments = Vec::new();
    let mut cursor = 0;

    for captures in re.captures_iter(wrapped_sql) {
        let whole = captures
            .get(0)
            .ok_or_else(|| AdapterError::OperationDecode {
                message: "marker match without content".to_string(),
            })?;
        let payload = captures
            .get(1)
            .ok_or_else(|| AdapterError::OperationDecode {
                message: "marker match without payload".to_string(),
            })?;

        push_statement(&mut segments, &wrapped_sql[cursor..whole.start()]);
        segments.push(Segment::Operation(decode_operation(payload.as_str())?));
        cursor = whole.end();
    }

    push_statement(&mut segments, &wrapped_sql[cursor..]);
    Ok(segments)
}

fn push_statement(segments: &mut Vec<Segment>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        segments.push(Segment::Statement(trimmed.to_string()));
    }
}

/// Decode one marker payload: `{function: string, args: mapping}`.
fn decode_operation(payload: &str) -> AdapterResult<Operation> {
    serde_yaml::from_str(payload).map_err(|e| AdapterError::OperationDecode {
        message: format!("{}: {}", e, payload),
    })
}

#[cfg(test)]
#[path = "operation_test.rs"]
mod tests;
