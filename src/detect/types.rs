//! Core types for scan issues.

use serde::{Deserialize, Serialize};

/// Severity levels for issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Kinds of recoverable problems recorded during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ParseFailed,
    ReadFailed,
    FileTooLarge,
    FileTimeout,
    UnresolvedSpread,
    AggregationConflict,
    InvalidIgnorePattern,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::ParseFailed => "parse_failed",
            IssueKind::ReadFailed => "read_failed",
            IssueKind::FileTooLarge => "file_too_large",
            IssueKind::FileTimeout => "file_timeout",
            IssueKind::UnresolvedSpread => "unresolved_spread",
            IssueKind::AggregationConflict => "aggregation_conflict",
            IssueKind::InvalidIgnorePattern => "invalid_ignore_pattern",
        }
    }

    /// Default severity for this kind of issue.
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::ParseFailed | IssueKind::ReadFailed | IssueKind::FileTimeout => {
                Severity::Error
            }
            IssueKind::FileTooLarge
            | IssueKind::AggregationConflict
            | IssueKind::InvalidIgnorePattern => Severity::Warning,
            IssueKind::UnresolvedSpread => Severity::Info,
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recoverable problem: the scan succeeded, with this caveat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Issue {
    /// Create an issue with the kind's default severity.
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Ordering key used to make issue lists deterministic.
    pub fn sort_key(&self) -> (Option<&str>, Option<usize>, IssueKind, &str) {
        (self.file.as_deref(), self.line, self.kind, &self.message)
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: ", file, line)?,
            (Some(file), None) => write!(f, "{}: ", file)?,
            _ => {}
        }
        write!(f, "{} [{}]", self.message, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = Issue::new(IssueKind::ParseFailed, "syntax error near line 3")
            .in_file("src/app.js")
            .at_line(3);
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(
            issue.to_string(),
            "src/app.js:3: syntax error near line 3 [parse_failed]"
        );
    }

    #[test]
    fn test_issue_serializes_snake_case_kind() {
        let issue = Issue::new(IssueKind::UnresolvedSpread, "spread of `base`");
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"kind\":\"unresolved_spread\""));
        assert!(json.contains("\"severity\":\"info\""));
        assert!(!json.contains("\"file\""));
    }
}
