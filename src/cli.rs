//! Command-line interface for trackscan.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{self, Config, SignatureSpec, DEFAULT_CONFIG_NAMES};
use crate::detect::Scanner;
use crate::report;
use crate::schema::{OutputFormat, ScanResult};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Commented configuration written by `trackscan init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Analytics tracking-plan extractor.
///
/// Trackscan walks a source tree, finds every call that fires an analytics
/// event (Segment, Mixpanel, Amplitude, Google Analytics, and more), and
/// writes a versioned tracking plan listing each event, its properties, and
/// every place it is implemented.
#[derive(Parser)]
#[command(name = "trackscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a source tree and write a tracking plan
    Scan(ScanArgs),
    /// Check that a tracking plan file is readable by this version
    Validate(ValidateArgs),
    /// List supported providers and their call conventions
    Providers,
    /// Create a trackscan.yaml configuration file
    Init(InitArgs),
}

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    /// Root directory to scan
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover in the scan root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only detect these providers (repeatable)
    #[arg(short, long = "provider")]
    pub providers: Vec<String>,

    /// Custom tracking function, e.g. 'track(userId, EVENT_NAME, PROPERTIES)' (repeatable)
    #[arg(long = "custom-function")]
    pub custom_functions: Vec<String>,

    /// Glob pattern for paths to skip (repeatable)
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Output format: yaml or json (default: from the output file extension)
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// Output file
    #[arg(short, long, default_value = "tracking-plan.yaml")]
    pub output: PathBuf,

    /// Write the tracking plan to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,

    /// Repository URL to record (default: git remote.origin.url)
    #[arg(long)]
    pub repository_url: Option<String>,

    /// Commit hash to record (default: git HEAD)
    #[arg(long)]
    pub commit_hash: Option<String>,

    /// Commit timestamp to record, RFC 3339 (default: HEAD commit time)
    #[arg(long)]
    pub commit_timestamp: Option<String>,

    /// Skip files larger than this many bytes
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Per-file time budget in milliseconds (0 disables)
    #[arg(long)]
    pub file_timeout_ms: Option<u64>,

    /// Whole-scan time budget in milliseconds
    #[arg(long)]
    pub scan_timeout_ms: Option<u64>,

    /// Worker threads (default: one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Also write the issue list as JSON to this file
    #[arg(long)]
    pub issues: Option<PathBuf>,

    /// Do not print the summary
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the validate command.
#[derive(Parser)]
pub struct ValidateArgs {
    /// Tracking plan file (.yaml, .yml or .json)
    pub file: PathBuf,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "trackscan.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Install the stderr log subscriber.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "trackscan=warn",
        1 => "trackscan=info",
        _ => "trackscan=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Fails only if a subscriber is already set, which is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Config from the file (given or discovered) with command-line flags on top.
fn load_config(args: &ScanArgs, root: &Path) -> anyhow::Result<Config> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Config::discover(root),
    };
    let mut config = match &path {
        Some(path) => {
            debug!(config = %path.display(), "loading config");
            Config::parse_file(path)?
        }
        None => Config::default(),
    };

    config.apply(Config {
        providers: args.providers.clone(),
        custom_functions: args
            .custom_functions
            .iter()
            .cloned()
            .map(SignatureSpec::Text)
            .collect(),
        ignore: args.ignore.clone(),
        max_file_size: args.max_file_size,
        file_timeout_ms: args.file_timeout_ms,
        scan_timeout_ms: args.scan_timeout_ms,
        concurrency: args.jobs,
    });
    config::validate(&config)?;
    Ok(config)
}

/// Normalise a user-supplied commit timestamp to RFC 3339.
fn parse_timestamp(raw: &str) -> anyhow::Result<String> {
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .map_err(|e| anyhow::anyhow!("invalid commit timestamp {:?}: {}", raw, e))?;
    Ok(parsed.to_rfc3339())
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs) -> anyhow::Result<i32> {
    let root = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let config = match load_config(args, &root) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let mut options = config.to_options()?;
    options.repository = args.repository_url.clone();
    options.commit = args.commit_hash.clone();
    options.timestamp = match &args.commit_timestamp {
        Some(raw) => match parse_timestamp(raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        },
        None => None,
    };

    let outcome = match Scanner::new(&root).options(options).run() {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let format = args
        .format
        .unwrap_or_else(|| OutputFormat::from_path(&args.output));
    let rendered = outcome.result.render(format)?;

    let output_label = if args.stdout {
        print!("{}", rendered);
        None
    } else {
        write_output(&args.output, &rendered)?;
        Some(args.output.to_string_lossy().to_string())
    };

    let path_str = args.path.to_string_lossy().to_string();
    if let Some(issues_path) = &args.issues {
        report::write_issues_json(issues_path, &path_str, &outcome.issues)?;
    }

    if !args.quiet {
        report::write_pretty(&path_str, output_label.as_deref(), &outcome);
    }

    // Issues are caveats, not failures.
    Ok(EXIT_SUCCESS)
}

fn write_output(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))
}

/// Run the validate command.
pub fn run_validate(args: &ValidateArgs) -> anyhow::Result<i32> {
    let path_str = args.file.to_string_lossy().to_string();
    match ScanResult::read_file(&args.file) {
        Ok(result) => {
            report::write_validation(&path_str, &result);
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}: {}", path_str, e);
            Ok(EXIT_FAILED)
        }
    }
}

/// Run the providers command.
pub fn run_providers() -> anyhow::Result<i32> {
    print!("{}", report::render_providers());
    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to overwrite, or --output to pick another path");
        return Ok(EXIT_ERROR);
    }

    if let Err(e) = write_output(&args.output, DEFAULT_CONFIG_TEMPLATE) {
        eprintln!("Error: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to list providers and custom functions", args.output.display());
    if !DEFAULT_CONFIG_NAMES
        .iter()
        .any(|name| args.output.file_name().map_or(false, |f| f == *name))
    {
        println!(
            "  2. Run: trackscan scan . --config {}",
            args.output.display()
        );
    } else {
        println!("  2. Run: trackscan scan .");
    }

    Ok(EXIT_SUCCESS)
}
