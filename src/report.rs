//! Output formatting for trackscan results.
//!
//! Supports two outputs besides the schema document itself:
//! - Pretty: colored summary on stderr, so stdout can carry the schema
//! - JSON: the issue list, for programmatic consumption

use std::fmt::Write as _;
use std::path::Path;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::detect::{rules, Dialect, Issue, ScanOutcome, Severity};
use crate::schema::ScanResult;

// =============================================================================
// JSON Format
// =============================================================================

/// Issue report written by `trackscan scan --issues`.
#[derive(Serialize, Deserialize)]
pub struct JsonIssueReport {
    pub version: String,
    pub path: String,
    pub error_count: usize,
    pub warning_count: usize,
    pub issues: Vec<Issue>,
}

impl JsonIssueReport {
    pub fn new(path: &str, issues: &[Issue]) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            path: path.to_string(),
            error_count: count(issues, Severity::Error),
            warning_count: count(issues, Severity::Warning),
            issues: issues.to_vec(),
        }
    }
}

/// Write the issue list as JSON to `output`.
pub fn write_issues_json(output: &Path, path: &str, issues: &[Issue]) -> anyhow::Result<()> {
    let report = JsonIssueReport::new(path, issues);
    let mut json = serde_json::to_string_pretty(&report)?;
    json.push('\n');
    std::fs::write(output, json)?;
    Ok(())
}

fn count(issues: &[Issue], severity: Severity) -> usize {
    issues.iter().filter(|i| i.severity == severity).count()
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write a scan summary to stderr.
pub fn write_pretty(path: &str, output: Option<&str>, outcome: &ScanOutcome) {
    eprint!("{}", render_pretty(path, output, outcome));
}

/// The scan summary as text.
pub fn render_pretty(path: &str, output: Option<&str>, outcome: &ScanOutcome) -> String {
    let mut out = String::new();
    let result = &outcome.result;

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {} v{}",
        "trackscan".cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}{}", "Scanning: ".dimmed(), path);
    if let Some(output) = output {
        let _ = writeln!(out, "  {}{}", "Output:   ".dimmed(), output);
    }
    let _ = writeln!(out);

    write_counts(&mut out, result);
    let _ = writeln!(out);

    if !outcome.issues.is_empty() {
        write_issues(&mut out, &outcome.issues);
    }

    let errors = count(&outcome.issues, Severity::Error);
    if errors == 0 {
        let _ = writeln!(out, "  {}", "✓ Scan complete".green());
    } else {
        let _ = writeln!(
            out,
            "  {} {}",
            "✓ Scan complete".yellow(),
            format!("({} files could not be analysed)", errors).dimmed()
        );
    }
    let _ = writeln!(out);
    out
}

/// Write a summary of a schema file read back by `trackscan validate`.
pub fn write_validation(path: &str, result: &ScanResult) {
    eprint!("{}", render_validation(path, result));
}

pub fn render_validation(path: &str, result: &ScanResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {}  {} (schema version {})",
        "✓ VALID".green(),
        path,
        result.version
    );
    let _ = writeln!(out);
    write_counts(&mut out, result);
    if let Some(repository) = &result.source.repository {
        let _ = writeln!(out, "  {}{}", "Repository: ".dimmed(), repository);
    }
    if let Some(commit) = &result.source.commit {
        let _ = writeln!(out, "  {}{}", "Commit:     ".dimmed(), commit);
    }
    let _ = writeln!(out, "  {}{}", "Timestamp:  ".dimmed(), result.source.timestamp);
    let _ = writeln!(out);
    out
}

fn write_counts(out: &mut String, result: &ScanResult) {
    let metadata = &result.metadata;
    let _ = writeln!(
        out,
        "  {} {}   {} {}   {} {}",
        "Events:".bold(),
        metadata.event_count.to_string().green().bold(),
        "Implementations:".bold(),
        metadata.implementation_count,
        "Files:".bold(),
        metadata.files_scanned,
    );
    let _ = writeln!(
        out,
        "  {}",
        format!("finished in {} ms", metadata.duration_ms).dimmed()
    );
}

fn write_issues(out: &mut String, issues: &[Issue]) {
    let _ = writeln!(out, "  {} ({}):", "Issues".bold(), issues.len());
    let _ = writeln!(out);

    for issue in issues {
        let _ = write!(out, "{}", severity_tag(issue.severity));
        let _ = write!(out, "   {:<24}", issue.kind.as_str().dimmed());
        match (&issue.file, issue.line) {
            (Some(file), Some(line)) => {
                let _ = write!(out, "{}{}", file.blue(), format!(":{}", line).dimmed());
            }
            (Some(file), None) => {
                let _ = write!(out, "{}", file.blue());
            }
            _ => {}
        }
        let _ = writeln!(out);

        // Message on next line, indented
        let _ = writeln!(out, "            {}", issue.message);
        let _ = writeln!(out);
    }
}

fn severity_tag(severity: Severity) -> String {
    match severity {
        Severity::Error => format!("    {} ", "ERROR".red()),
        Severity::Warning => format!("    {} ", "WARN ".yellow()),
        Severity::Info => format!("    {} ", "INFO ".blue()),
    }
}

// =============================================================================
// Provider listing
// =============================================================================

/// The provider table as shown by `trackscan providers`.
pub fn render_providers() -> String {
    let mut out = String::new();
    for (title, dialect) in [
        ("JavaScript / TypeScript", Dialect::EcmaScript),
        ("Python", Dialect::Python),
        ("Go", Dialect::Go),
        ("Ruby", Dialect::Ruby),
    ] {
        let _ = writeln!(out, "{}:", title.bold());
        for rule in rules(dialect) {
            let _ = writeln!(out, "  {:<18} {}", rule.provider.as_str(), rule.example);
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(
        out,
        "{}",
        "Custom wrappers: --custom-function 'name(userId, EVENT_NAME, PROPERTIES)'".dimmed()
    );
    out
}
