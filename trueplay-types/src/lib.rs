//! Shared types for trueplay
//!
//! This crate provides the data model shared across the trueplay crates:
//! source spans, log entries produced by script runs, and template metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range in a source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`
    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Classification of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Error,
    Response,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Error => "error",
            LogStatus::Response => "response",
        }
    }

    /// Parse the lowercase wire name (`"success"`, `"error"`, `"response"`)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Some(LogStatus::Success),
            "error" => Some(LogStatus::Error),
            "response" => Some(LogStatus::Response),
            _ => None,
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded event of a script run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub message: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
    pub status: LogStatus,
}

impl LogEntry {
    pub fn new(id: impl Into<String>, message: impl Into<String>, timestamp: i64, status: LogStatus) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            timestamp,
            status,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == LogStatus::Error
    }

    pub fn is_response(&self) -> bool {
        self.status == LogStatus::Response
    }
}

/// Template grouping shown in the sidebar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    Attestations,
    Reputation,
    Utility,
}

impl TemplateCategory {
    pub const ALL: [TemplateCategory; 3] = [
        TemplateCategory::Attestations,
        TemplateCategory::Reputation,
        TemplateCategory::Utility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::Attestations => "attestations",
            TemplateCategory::Reputation => "reputation",
            TemplateCategory::Utility => "utility",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw.trim())
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source language a template is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    Typescript,
    Assemblyscript,
}

impl CodeLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeLanguage::Typescript => "typescript",
            CodeLanguage::Assemblyscript => "assemblyscript",
        }
    }
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        for status in [LogStatus::Success, LogStatus::Error, LogStatus::Response] {
            assert_eq!(LogStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LogStatus::parse("ERROR"), Some(LogStatus::Error));
        assert_eq!(LogStatus::parse("warning"), None);
    }

    #[test]
    fn test_span_merge() {
        let merged = Span::new(4, 6).merge(Span::new(1, 3));
        assert_eq!(merged, Span::new(1, 6));
        assert_eq!(merged.len(), 5);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(TemplateCategory::parse("reputation"), Some(TemplateCategory::Reputation));
        assert_eq!(TemplateCategory::parse("nope"), None);
    }
}
