//! Repository metadata for the `source` block of a scan result.
//!
//! Uses subprocess calls to git. A missing git binary or a scan root outside
//! any repository is not an error: the fields are simply absent.

use std::path::Path;
use std::process::Command;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::error::GitError;

/// Run a git command in `cwd` and return trimmed stdout.
pub fn git_command(args: &[&str], cwd: &Path) -> Result<String, GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| GitError::Spawn(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::Failed {
            command: args.join(" "),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git command, returning None if it fails or prints nothing.
pub fn git_command_optional(args: &[&str], cwd: &Path) -> Option<String> {
    match git_command(args, cwd) {
        Ok(out) if !out.is_empty() => Some(out),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "git query failed");
            None
        }
    }
}

/// What git knows about the scanned tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoDetails {
    pub repository: Option<String>,
    pub commit: Option<String>,
    /// Committer date of HEAD, ISO 8601.
    pub timestamp: Option<String>,
}

impl RepoDetails {
    pub fn discover(root: &Path) -> Self {
        Self {
            repository: git_command_optional(&["config", "--get", "remote.origin.url"], root),
            commit: git_command_optional(&["rev-parse", "HEAD"], root),
            timestamp: git_command_optional(&["show", "-s", "--format=%cI", "HEAD"], root),
        }
    }
}

/// The current time in the format used for `source.timestamp`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
