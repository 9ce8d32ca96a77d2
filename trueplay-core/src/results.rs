//! Presenting the log of a run: status, console lines, the response as
//! formatted JSON or as a table, and timestamp labels.

use chrono::{Local, TimeZone};
use serde::Serialize;
use serde_json::Value as Json;
use trueplay_types::{LogEntry, LogStatus};

/// Longest table cell shown before truncation
const MAX_CELL_CHARS: usize = 100;

/// Outcome of the latest run as shown in the status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Success,
    Error,
}

impl RunStatus {
    /// Success when a RESPONSE entry exists, Error for any other non-empty log
    pub fn of(logs: &[LogEntry]) -> Self {
        if logs.is_empty() {
            RunStatus::Idle
        } else if logs.iter().any(LogEntry::is_response) {
            RunStatus::Success
        } else {
            RunStatus::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }
}

/// Everything but the RESPONSE entry, in log order
pub fn console_entries(logs: &[LogEntry]) -> Vec<&LogEntry> {
    logs.iter().filter(|entry| entry.status != LogStatus::Response).collect()
}

/// Message of the RESPONSE entry, if the run produced one
pub fn response(logs: &[LogEntry]) -> Option<&str> {
    logs.iter().find(|entry| entry.is_response()).map(|entry| entry.message.as_str())
}

/// Pretty-print `text` when it parses as JSON, otherwise return it unchanged
pub fn format_json(text: &str) -> String {
    match serde_json::from_str::<Json>(text) {
        Ok(json) => serde_json::to_string_pretty(&json).unwrap_or_else(|_| text.to_string()),
        Err(err) => {
            tracing::debug!(%err, "Response is not JSON");
            text.to_string()
        }
    }
}

/// A response laid out as rows under a header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn failed() -> Self {
        Self {
            headers: vec!["Error".to_string()],
            rows: vec![vec!["Failed to parse JSON".to_string()]],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plain-text rendering with padded columns
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(line(self.headers.as_slice()));
        out.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
        out.extend(self.rows.iter().map(|row| line(row.as_slice())));
        out.join("\n")
    }
}

/// Convert a JSON response to a table.
///
/// An array becomes one row per element under the union of the elements'
/// keys (primitives go under `value`); an object becomes `key`/`value` rows.
pub fn tabulate(text: &str) -> Table {
    let json = match serde_json::from_str::<Json>(text) {
        Ok(json) => json,
        Err(_) => return Table::failed(),
    };

    let mut headers: Vec<String> = Vec::new();
    let mut records: Vec<Vec<(String, Json)>> = Vec::new();

    match json {
        Json::Array(items) => {
            for item in items {
                match item {
                    Json::Object(map) => {
                        for key in map.keys() {
                            add_header(key, &mut headers);
                        }
                        records.push(map.into_iter().collect());
                    }
                    other => {
                        add_header("value", &mut headers);
                        records.push(vec![("value".to_string(), other)]);
                    }
                }
            }
        }
        Json::Object(map) => {
            add_header("key", &mut headers);
            add_header("value", &mut headers);
            for (key, value) in map {
                records.push(vec![("key".to_string(), Json::String(key)), ("value".to_string(), value)]);
            }
        }
        _ => {}
    }

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|header| {
                    record
                        .iter()
                        .find(|(key, _)| key == header)
                        .map(|(_, value)| cell_text(value))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    Table { headers, rows }
}

fn add_header(key: &str, headers: &mut Vec<String>) {
    if !headers.iter().any(|h| h == key) {
        headers.push(key.to_string());
    }
}

fn cell_text(value: &Json) -> String {
    let text = match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Array(_) | Json::Object(_) => value.to_string(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_CHARS {
        let cut: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

/// Wall-clock time of a log entry in the local timezone
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => String::new(),
    }
}

/// Relative label such as "5 secs ago" or "1 hour ago"
pub fn time_ago(timestamp_ms: i64, now_ms: i64) -> String {
    let seconds = (now_ms - timestamp_ms).max(0) / 1000;
    let (amount, unit) = if seconds < 60 {
        (seconds, "sec")
    } else if seconds < 60 * 60 {
        (seconds / 60, "min")
    } else if seconds < 24 * 60 * 60 {
        (seconds / (60 * 60), "hour")
    } else {
        (seconds / (24 * 60 * 60), "day")
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("{} {}{} ago", amount, unit, plural)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str, status: LogStatus) -> LogEntry {
        LogEntry::new("1-0", message, 0, status)
    }

    #[test]
    fn test_run_status() {
        assert_eq!(RunStatus::of(&[]), RunStatus::Idle);
        assert_eq!(
            RunStatus::of(&[entry("hi", LogStatus::Success), entry("{}", LogStatus::Response)]),
            RunStatus::Success
        );
        assert_eq!(RunStatus::of(&[entry("boom", LogStatus::Error)]), RunStatus::Error);
        assert_eq!(RunStatus::of(&[entry("only console", LogStatus::Success)]), RunStatus::Error);
    }

    #[test]
    fn test_console_and_response_split() {
        let logs = vec![
            entry("a", LogStatus::Success),
            entry("[1]", LogStatus::Response),
            entry("b", LogStatus::Error),
        ];
        let console: Vec<_> = console_entries(&logs).iter().map(|e| e.message.as_str()).collect();
        assert_eq!(console, ["a", "b"]);
        assert_eq!(response(&logs), Some("[1]"));
    }

    #[test]
    fn test_format_json() {
        insta::assert_snapshot!(format_json(r#"{"a":1,"b":[true]}"#), @r###"
        {
          "a": 1,
          "b": [
            true
          ]
        }
        "###);
        assert_eq!(format_json("not json"), "not json");
    }

    #[test]
    fn test_tabulate_array_of_objects() {
        let table = tabulate(r#"[{"name":"Ram","score":85},{"name":"Sita","rank":1},3]"#);
        assert_eq!(table.headers, ["name", "score", "rank", "value"]);
        assert_eq!(
            table.rows,
            [
                vec!["Ram", "85", "", ""],
                vec!["Sita", "", "1", ""],
                vec!["", "", "", "3"],
            ]
        );
    }

    #[test]
    fn test_tabulate_object() {
        let table = tabulate(r#"{"txHash":"0x01","nested":{"a":null}}"#);
        assert_eq!(table.headers, ["key", "value"]);
        assert_eq!(table.rows, [vec!["txHash", "0x01"], vec!["nested", r#"{"a":null}"#]]);
    }

    #[test]
    fn test_tabulate_failures() {
        assert_eq!(tabulate("{oops"), Table::failed());
        assert!(tabulate("42").is_empty());

        let long = format!(r#"[{{"cid":"{}"}}]"#, "x".repeat(150));
        let cell = &tabulate(&long).rows[0][0];
        assert_eq!(cell.chars().count(), 100);
        assert!(cell.ends_with("..."));
    }

    #[test]
    fn test_render_table() {
        let table = tabulate(r#"[{"name":"Ram","score":85}]"#);
        insta::assert_snapshot!(table.render(), @r###"
        name | score
        -----+------
        Ram  | 85
        "###);
    }

    #[test]
    fn test_time_ago() {
        let now = 10_000_000_000;
        assert_eq!(time_ago(now, now), "0 secs ago");
        assert_eq!(time_ago(now - 1_000, now), "1 sec ago");
        assert_eq!(time_ago(now - 125_000, now), "2 mins ago");
        assert_eq!(time_ago(now - 3_600_000, now), "1 hour ago");
        assert_eq!(time_ago(now - 3 * 86_400_000, now), "3 days ago");
        assert_eq!(time_ago(now + 5_000, now), "0 secs ago");
    }

    #[test]
    fn test_format_timestamp_shape() {
        let text = format_timestamp(1_700_000_000_000);
        assert_eq!(text.len(), 8);
        assert_eq!(text.matches(':').count(), 2);
    }
}
