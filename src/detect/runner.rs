//! Scan orchestration: enumerate, analyse in parallel, aggregate.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::{get_adapter, register_adapters};
use crate::error::{ParseError, Result, ScanError};
use crate::git::{now_timestamp, RepoDetails};
use crate::schema::{ScanMetadata, ScanResult, SourceMetadata, SCHEMA_VERSION};

use super::aggregate::EventAggregator;
use super::files::{collect_sources, FileSet, IgnoreRules, SourceFile};
use super::matcher::{FileMatches, Matcher};
use super::providers::Provider;
use super::signature::CustomSignature;
use super::types::{Issue, IssueKind, Severity};

/// Files above this size are skipped by default.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Default bound on parsing and matching a single file.
pub const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Cooperative cancellation shared between a scan and its caller.
///
/// Checked before each file starts; files already in flight finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything that shapes a scan apart from its root.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub providers: Vec<Provider>,
    pub custom_functions: Vec<CustomSignature>,
    pub ignore: Vec<String>,
    pub max_file_size: u64,
    pub file_timeout: Option<Duration>,
    pub scan_timeout: Option<Duration>,
    /// Worker threads; `None` uses one per core.
    pub concurrency: Option<usize>,
    pub repository: Option<String>,
    pub commit: Option<String>,
    pub timestamp: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            providers: Provider::BUILTIN.to_vec(),
            custom_functions: Vec::new(),
            ignore: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            file_timeout: Some(DEFAULT_FILE_TIMEOUT),
            scan_timeout: None,
            concurrency: None,
            repository: None,
            commit: None,
            timestamp: None,
        }
    }
}

/// A finished scan: the schema document plus every recoverable problem.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub result: ScanResult,
    /// Sorted by file, line and kind.
    pub issues: Vec<Issue>,
}

impl ScanOutcome {
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == Severity::Error)
    }
}

/// Scans a directory tree for analytics calls.
pub struct Scanner {
    root: PathBuf,
    options: ScanOptions,
    cancel: CancellationToken,
}

enum FileOutcome {
    Analyzed(FileMatches),
    /// Not started because the scan was cancelled or ran out of time.
    Interrupted,
}

impl Scanner {
    /// Create a scanner with default options.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options: ScanOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace all options at once.
    pub fn options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Restrict detection to these providers.
    pub fn providers(mut self, providers: Vec<Provider>) -> Self {
        self.options.providers = providers;
        self
    }

    pub fn custom_functions(mut self, signatures: Vec<CustomSignature>) -> Self {
        self.options.custom_functions = signatures;
        self
    }

    pub fn ignore(mut self, patterns: Vec<String>) -> Self {
        self.options.ignore = patterns;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.options.max_file_size = bytes;
        self
    }

    pub fn file_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.file_timeout = timeout;
        self
    }

    pub fn scan_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.scan_timeout = timeout;
        self
    }

    pub fn concurrency(mut self, threads: usize) -> Self {
        self.options.concurrency = Some(threads);
        self
    }

    /// Use an externally held token so the caller can cancel the scan.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels this scan.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the scan.
    ///
    /// Per-file problems are returned as issues on the outcome. Only an
    /// unusable root, an exceeded scan timeout and cancellation fail.
    pub fn run(&self) -> Result<ScanOutcome> {
        let started = Instant::now();
        let root = self.resolve_root()?;
        register_adapters();

        let (ignore, mut issues) = IgnoreRules::build(&self.options.ignore);
        let FileSet {
            files,
            issues: walk_issues,
        } = collect_sources(&root, &ignore, self.options.max_file_size);
        issues.extend(walk_issues);
        debug!(root = %root.display(), files = files.len(), "collected sources");

        let matcher = Matcher::new(
            self.options.providers.clone(),
            self.options.custom_functions.clone(),
        );
        let deadline = self.options.scan_timeout.map(|limit| started + limit);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.concurrency.unwrap_or(0))
            .build()
            .map_err(|e| ScanError::ThreadPool(e.to_string()))?;

        // `collect` keeps input order, so the merge below sees files in
        // sorted path order whatever the scheduling.
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|file| self.visit(file, &matcher, deadline))
                .collect()
        });

        if self.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        // Only a deadline interrupts a scan that was not cancelled. Files
        // already in flight may also have run past it.
        let interrupted = outcomes
            .iter()
            .any(|o| matches!(o, FileOutcome::Interrupted));
        if interrupted || expired(deadline) {
            return Err(ScanError::Timeout {
                limit: self.options.scan_timeout.unwrap_or_default(),
            });
        }

        let mut aggregator = EventAggregator::new();
        for outcome in outcomes {
            if let FileOutcome::Analyzed(matches) = outcome {
                issues.extend(matches.issues);
                aggregator.extend(matches.detections);
            }
        }
        let (events, conflicts) = aggregator.finish();
        issues.extend(conflicts);
        issues.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let metadata = ScanMetadata {
            event_count: events.len(),
            implementation_count: events.values().map(|e| e.implementations.len()).sum(),
            files_scanned: files.len(),
            duration_ms,
            custom_functions: self
                .options
                .custom_functions
                .iter()
                .map(ToString::to_string)
                .collect(),
            ignored_patterns: ignore.patterns().to_vec(),
        };

        info!(
            events = metadata.event_count,
            implementations = metadata.implementation_count,
            files = metadata.files_scanned,
            issues = issues.len(),
            duration_ms,
            "scan finished"
        );

        Ok(ScanOutcome {
            result: ScanResult {
                version: SCHEMA_VERSION,
                source: self.source_metadata(&root),
                events,
                metadata,
            },
            issues,
        })
    }

    fn resolve_root(&self) -> Result<PathBuf> {
        let invalid = || ScanError::InvalidRoot {
            path: self.root.clone(),
        };
        let root = self.root.canonicalize().map_err(|_| invalid())?;
        if !root.is_dir() {
            return Err(invalid());
        }
        std::fs::read_dir(&root).map_err(|_| invalid())?;
        Ok(root)
    }

    fn visit(&self, file: &SourceFile, matcher: &Matcher, deadline: Option<Instant>) -> FileOutcome {
        if self.cancel.is_cancelled() {
            return FileOutcome::Interrupted;
        }
        if expired(deadline) {
            return FileOutcome::Interrupted;
        }
        FileOutcome::Analyzed(analyze_file(file, matcher, self.options.file_timeout))
    }

    fn source_metadata(&self, root: &Path) -> SourceMetadata {
        let options = &self.options;
        let needs_git =
            options.repository.is_none() || options.commit.is_none() || options.timestamp.is_none();
        let details = if needs_git {
            RepoDetails::discover(root)
        } else {
            RepoDetails::default()
        };

        SourceMetadata {
            repository: options.repository.clone().or(details.repository),
            commit: options.commit.clone().or(details.commit),
            timestamp: options
                .timestamp
                .clone()
                .or(details.timestamp)
                .unwrap_or_else(now_timestamp),
        }
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |d| Instant::now() >= d)
}

/// Read, parse, lower and match one file. Never fails: problems come back
/// as issues.
fn analyze_file(file: &SourceFile, matcher: &Matcher, timeout: Option<Duration>) -> FileMatches {
    let failed = |issue: Issue| FileMatches {
        detections: Vec::new(),
        issues: vec![issue.in_file(file.relative.as_str())],
    };

    let ext = file.path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let Some(adapter) = get_adapter(ext) else {
        return FileMatches::default();
    };

    let started = Instant::now();
    let source = match std::fs::read(&file.path) {
        Ok(source) => source,
        Err(e) => {
            warn!(file = %file.relative, error = %e, "failed to read file");
            return failed(Issue::new(IssueKind::ReadFailed, e.to_string()));
        }
    };

    let parsed = match adapter.parse(Path::new(&file.relative), &source, timeout) {
        Ok(parsed) => parsed,
        Err(ParseError::TimedOut(limit)) => {
            warn!(file = %file.relative, "parse timed out");
            return failed(Issue::new(
                IssueKind::FileTimeout,
                format!("parsing exceeded {:?}", limit),
            ));
        }
        Err(ParseError::Syntax { line }) => {
            warn!(file = %file.relative, line, "syntax error, skipping file");
            return failed(
                Issue::new(
                    IssueKind::ParseFailed,
                    format!("syntax error near line {}", line),
                )
                .at_line(line),
            );
        }
        Err(e) => {
            warn!(file = %file.relative, error = %e, "parse failed");
            return failed(Issue::new(IssueKind::ParseFailed, e.to_string()));
        }
    };

    let syntax = match adapter.lower(&parsed) {
        Ok(syntax) => syntax,
        Err(e) => {
            warn!(file = %file.relative, error = %e, "failed to analyse file");
            return failed(Issue::new(IssueKind::ParseFailed, format!("{:#}", e)));
        }
    };

    let matches = matcher.match_file(&syntax);
    if let Some(limit) = timeout {
        if started.elapsed() > limit {
            warn!(file = %file.relative, "analysis timed out");
            return failed(Issue::new(
                IssueKind::FileTimeout,
                format!("analysis exceeded {:?}", limit),
            ));
        }
    }

    debug!(
        file = %file.relative,
        language = syntax.language,
        calls = syntax.calls.len(),
        detections = matches.detections.len(),
        "analysed file"
    );
    matches
}
