//! Transcript adapter: turns the newline-delimited JSON lines an agent
//! process writes as it runs into a sequence of `ToolCall` records. Used
//! by the CLI's `trace transcript` command and by `Extractor`
//! implementations that mine a finished run for learning candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub input: serde_json::Value,
}

/// One NDJSON line, exactly as written by the agent adapter. Lines that
/// don't describe a tool call (plain log lines interleaved in the same
/// file) are skipped rather than treated as malformed.
#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

/// Parse the full text of a transcript file into its tool calls, in
/// file order. A single malformed JSON line is an error — interleaved
/// non-tool-call log lines are not, since `RawLine` makes every field
/// but `timestamp`/name optional and simply skips lines missing both
/// `tool` and `name`.
pub fn parse(contents: &str) -> Result<Vec<ToolCall>> {
    let mut calls = Vec::new();
    for (line_number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw: RawLine = serde_json::from_str(line).map_err(|e| {
            Error::ValidationError(format!("transcript line {}: invalid JSON: {e}", line_number + 1))
        })?;

        let Some(name) = raw.name.or(raw.tool) else {
            continue;
        };
        let Some(timestamp) = raw.timestamp else {
            continue;
        };
        calls.push(ToolCall {
            timestamp,
            name,
            input: raw.input.unwrap_or(serde_json::Value::Null),
        });
    }
    Ok(calls)
}

/// Read and parse a transcript file from disk.
pub async fn read_file(path: &str) -> Result<Vec<ToolCall>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::ValidationError(format!("failed to read transcript {path}: {e}")))?;
    parse(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_calls_and_skips_plain_log_lines() {
        let contents = concat!(
            "{\"timestamp\":\"2026-01-01T00:00:00Z\",\"name\":\"read_file\",\"input\":{\"path\":\"a.rs\"}}\n",
            "{\"level\":\"info\",\"message\":\"starting up\"}\n",
            "{\"timestamp\":\"2026-01-01T00:00:05Z\",\"tool\":\"write_file\",\"input\":{\"path\":\"b.rs\"}}\n",
        );
        let calls = parse(contents).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[1].name, "write_file");
    }

    #[test]
    fn malformed_json_line_is_an_error() {
        let err = parse("not json at all").unwrap_err();
        assert_eq!(err.code(), "ValidationError");
    }

    #[test]
    fn blank_lines_are_ignored() {
        let calls = parse("\n\n   \n").unwrap();
        assert!(calls.is_empty());
    }
}
