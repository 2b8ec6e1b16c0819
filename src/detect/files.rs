//! Source enumeration under the scan root.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::analysis::supported_extensions;

use super::types::{Issue, IssueKind};

/// Directory and file names never descended into.
const SKIPPED_NAMES: &[&str] = &["node_modules", "coverage", "temp", "tmp", "log"];

/// A source file selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the scan root, `/`-separated.
    pub relative: String,
    pub size: u64,
}

/// User ignore globs.
///
/// Patterns are matched against the root-relative path. A pattern without a
/// `/` also matches the bare file or directory name, so `*.test.js` and
/// `generated` work at any depth.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    full: GlobSet,
    base: GlobSet,
    patterns: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            full: GlobSet::empty(),
            base: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }
}

impl IgnoreRules {
    /// Compile `patterns`. Invalid globs are skipped and reported.
    pub fn build(patterns: &[String]) -> (Self, Vec<Issue>) {
        let mut full = GlobSetBuilder::new();
        let mut base = GlobSetBuilder::new();
        let mut accepted = Vec::new();
        let mut issues = Vec::new();

        for pattern in patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    if !pattern.contains('/') {
                        base.add(glob.clone());
                    }
                    full.add(glob);
                    accepted.push(pattern.clone());
                }
                Err(e) => issues.push(Issue::new(
                    IssueKind::InvalidIgnorePattern,
                    format!("ignoring invalid pattern {:?}: {}", pattern, e),
                )),
            }
        }

        let rules = match (full.build(), base.build()) {
            (Ok(full), Ok(base)) => Self {
                full,
                base,
                patterns: accepted,
            },
            (Err(e), _) | (_, Err(e)) => {
                issues.push(Issue::new(
                    IssueKind::InvalidIgnorePattern,
                    format!("ignore patterns could not be compiled: {}", e),
                ));
                Self::default()
            }
        };
        (rules, issues)
    }

    /// The patterns that compiled.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_ignored(&self, relative: &str) -> bool {
        if self.full.is_match(relative) {
            return true;
        }
        let name = relative.rsplit('/').next().unwrap_or(relative);
        self.base.is_match(name)
    }
}

/// Files selected for a scan plus the problems met while walking.
#[derive(Debug, Default)]
pub struct FileSet {
    /// Sorted by relative path.
    pub files: Vec<SourceFile>,
    pub issues: Vec<Issue>,
}

/// Walk `root` and collect analysable sources.
///
/// Hidden entries and the usual build/output directories are skipped, as is
/// anything matching `ignore`. Files larger than `max_file_size` bytes are
/// reported and left out. Unreadable entries become `read_failed` issues.
pub fn collect_sources(root: &Path, ignore: &IgnoreRules, max_file_size: u64) -> FileSet {
    let mut set = FileSet::default();
    let extensions = supported_extensions();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped(root, e, ignore));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let mut issue = Issue::new(IssueKind::ReadFailed, e.to_string());
                if let Some(path) = e.path() {
                    issue = issue.in_file(relative_path(root, path));
                }
                set.issues.push(issue);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !extensions.contains(&ext) {
            continue;
        }

        let relative = relative_path(root, path);
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                set.issues
                    .push(Issue::new(IssueKind::ReadFailed, e.to_string()).in_file(relative));
                continue;
            }
        };
        if size > max_file_size {
            debug!(file = %relative, size, "skipping oversized file");
            set.issues.push(
                Issue::new(
                    IssueKind::FileTooLarge,
                    format!("file is {} bytes, limit is {}", size, max_file_size),
                )
                .in_file(relative),
            );
            continue;
        }

        set.files.push(SourceFile {
            path: path.to_path_buf(),
            relative,
            size,
        });
    }

    set.files.sort_by(|a, b| a.relative.cmp(&b.relative));
    set
}

fn is_skipped(root: &Path, entry: &DirEntry, ignore: &IgnoreRules) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') || SKIPPED_NAMES.contains(&name.as_ref()) {
        return true;
    }
    ignore.is_ignored(&relative_path(root, entry.path()))
}

/// `/`-separated path of `path` below `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn relatives(set: &FileSet) -> Vec<&str> {
        set.files.iter().map(|f| f.relative.as_str()).collect()
    }

    #[test]
    fn test_collects_supported_sources_sorted() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/b.ts", "");
        touch(temp.path(), "src/a.js", "");
        touch(temp.path(), "main.py", "");
        touch(temp.path(), "README.md", "");
        touch(temp.path(), "lib.rs", "");

        let set = collect_sources(temp.path(), &IgnoreRules::default(), 1024);
        assert_eq!(relatives(&set), vec!["main.py", "src/a.js", "src/b.ts"]);
        assert!(set.issues.is_empty());
    }

    #[test]
    fn test_skips_hidden_and_vendor_directories() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "node_modules/pkg/index.js", "");
        touch(temp.path(), ".git/hooks/x.js", "");
        touch(temp.path(), ".eslintrc.js", "");
        touch(temp.path(), "coverage/lcov.js", "");
        touch(temp.path(), "tmp/scratch.py", "");
        touch(temp.path(), "app.js", "");

        let set = collect_sources(temp.path(), &IgnoreRules::default(), 1024);
        assert_eq!(relatives(&set), vec!["app.js"]);
    }

    #[test]
    fn test_ignore_patterns() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/generated/api.ts", "");
        touch(temp.path(), "src/app.test.js", "");
        touch(temp.path(), "src/app.js", "");

        let (rules, issues) =
            IgnoreRules::build(&["**/generated/**".to_string(), "*.test.js".to_string()]);
        assert!(issues.is_empty());

        let set = collect_sources(temp.path(), &rules, 1024);
        assert_eq!(relatives(&set), vec!["src/app.js"]);
    }

    #[test]
    fn test_invalid_pattern_is_reported_not_fatal() {
        let (rules, issues) = IgnoreRules::build(&["src/[".to_string(), "*.py".to_string()]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::InvalidIgnorePattern);
        assert_eq!(rules.patterns(), &["*.py".to_string()]);
        assert!(rules.is_ignored("deep/dir/main.py"));
    }

    #[test]
    fn test_oversized_file_reported() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "big.js", &"x".repeat(64));
        touch(temp.path(), "small.js", "x");

        let set = collect_sources(temp.path(), &IgnoreRules::default(), 16);
        assert_eq!(relatives(&set), vec!["small.js"]);
        assert_eq!(set.issues.len(), 1);
        assert_eq!(set.issues[0].kind, IssueKind::FileTooLarge);
        assert_eq!(set.issues[0].file.as_deref(), Some("big.js"));
    }
}
