//! Error types for trackscan.
//!
//! Per-file problems never surface here: they become [`Issue`](crate::detect::Issue)
//! entries on the scan outcome. Only conditions that stop a scan outright, or
//! that make a schema document unreadable, are errors.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fatal scan conditions.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scan root does not exist or is not readable: {path}")]
    InvalidRoot { path: PathBuf },

    #[error("scan exceeded its time limit of {limit:?}")]
    Timeout { limit: Duration },

    #[error("scan was cancelled")]
    Cancelled,

    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a grammar adapter could not produce a tree.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("syntax error near line {line}")]
    Syntax { line: usize },

    #[error("parse did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("grammar setup failed: {0}")]
    Language(String),
}

/// Errors reading a schema document back.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u64, expected: u32 },

    #[error("schema document has no version field")]
    MissingVersion,

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors parsing a textual custom function signature.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid custom function signature: {0:?}")]
    Malformed(String),

    #[error("custom function signature {0:?} must include EVENT_NAME")]
    MissingEventName(String),

    #[error("custom function signature {0:?} repeats parameter {1}")]
    DuplicateParameter(String, String),
}

/// Errors from git subprocess calls. Never fatal to a scan.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to execute git: {0}")]
    Spawn(String),

    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;
